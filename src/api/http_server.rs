// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::ocr::{ocr_handler, upload_handler};
use crate::config::ServerConfig;
use crate::vision::HandwritingPipeline;

/// Headroom over the raw image limit for base64 and multipart framing
const BODY_LIMIT_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<HandwritingPipeline>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(pipeline: Arc<HandwritingPipeline>, request_timeout: Duration) -> Self {
        Self {
            pipeline,
            request_timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub recognizer: String,
    pub segmentation: String,
    pub version: String,
}

pub fn build_router(state: AppState) -> Router {
    // base64 bodies are a third larger than the image they carry
    let body_limit = state.pipeline.config().max_upload_bytes / 3 * 4 + BODY_LIMIT_OVERHEAD;

    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // JSON transcription endpoint
        .route("/v1/ocr", post(ocr_handler))
        // Multipart form upload
        .route("/upload", post(upload_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(
    config: &ServerConfig,
    pipeline: Arc<HandwritingPipeline>,
) -> anyhow::Result<()> {
    let state = AppState::new(pipeline, config.request_timeout());
    let app = build_router(state);

    let addr = config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        recognizer: state.pipeline.recognizer_name().to_string(),
        segmentation: state.pipeline.segmentation_strategy().to_string(),
        version: crate::version::VERSION.to_string(),
    })
}
