// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR endpoint handlers

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::Multipart;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::request::OcrRequest;
use super::response::{OcrResponse, UploadErrorResponse, UploadResponse};
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::PipelineError;

/// Multipart form field carrying the page image
pub const UPLOAD_FIELD: &str = "image";

/// Time lines already in flight get to finish after the deadline
pub const CANCEL_GRACE: Duration = Duration::from_secs(10);

/// Run `page` until it finishes or `deadline` passes
///
/// On the deadline the token is cancelled and the page is awaited for at most
/// `grace` more, so lines already in flight can complete and the rest are
/// skipped. A page still running after that is abandoned as a timeout.
async fn with_deadline<T>(
    deadline: Duration,
    grace: Duration,
    cancel: &CancellationToken,
    page: impl Future<Output = Result<T, PipelineError>>,
) -> Result<T, ApiError> {
    tokio::pin!(page);
    tokio::select! {
        result = &mut page => result.map_err(ApiError::from),
        _ = tokio::time::sleep(deadline) => {
            warn!("Request deadline of {:?} passed, cancelling remaining lines", deadline);
            cancel.cancel();
            match tokio::time::timeout(grace, page).await {
                Ok(result) => result.map_err(ApiError::from),
                Err(_) => {
                    warn!("Page still running {:?} after cancellation, giving up", grace);
                    Err(ApiError::Timeout)
                }
            }
        }
    }
}

/// POST /v1/ocr - Transcribe a handwritten page
///
/// # Request
/// - `image`: Base64-encoded image data (required), data URLs accepted
/// - `includeLines`: Return per-line entries (default true)
///
/// # Response
/// - `text`: Page text, one line per detected text line
/// - `lines`: Row band, status and text for each line
/// - `failedLines`: Lines the recognizer could not read
/// - `processingTimeMs`: Processing time in milliseconds
///
/// # Errors
/// - 400 Bad Request: Missing or undecodable image
/// - 408 Request Timeout: Deadline passed before all lines were read
/// - 503 Service Unavailable: Recognizer unavailable
pub async fn ocr_handler(
    State(state): State<AppState>,
    Json(request): Json<OcrRequest>,
) -> Result<Json<OcrResponse>, ApiError> {
    let max_bytes = state.pipeline.config().max_upload_bytes;
    let image = request.validate(max_bytes).map_err(|e| {
        warn!("OCR validation failed: {}", e);
        e
    })?;

    let cancel = CancellationToken::new();
    // Client disconnect drops this future; lines not yet started are skipped
    let _disconnect = cancel.clone().drop_guard();
    let (transcript, image_info) = with_deadline(
        state.request_timeout,
        CANCEL_GRACE,
        &cancel,
        state.pipeline.transcribe_base64(image, &cancel),
    )
    .await
    .map_err(|e| {
        warn!("OCR request failed: {}", e);
        e
    })?;

    info!(
        "OCR complete: {}x{} input, {} lines, {}ms",
        image_info.width,
        image_info.height,
        transcript.lines.len(),
        transcript.processing_time_ms
    );

    Ok(Json(OcrResponse::from_transcript(
        transcript,
        request.include_lines,
        state.pipeline.recognizer_name(),
        state.pipeline.segmentation_strategy(),
    )))
}

/// POST /upload - Transcribe a page sent as multipart form field `image`
///
/// Responds with `{"extracted_text": "..."}`, or `{"error": "..."}` on failure.
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, (StatusCode, Json<UploadErrorResponse>)> {
    let mut image_bytes = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart body: {}", e);
                return Err(upload_error(StatusCode::BAD_REQUEST, e.to_string()));
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        match field.bytes().await {
            Ok(bytes) => {
                image_bytes = Some(bytes);
                break;
            }
            Err(e) => {
                warn!("Failed to read upload field: {}", e);
                return Err(upload_error(StatusCode::BAD_REQUEST, e.to_string()));
            }
        }
    }

    let image_bytes = image_bytes.ok_or_else(|| {
        warn!("Upload without an '{}' field", UPLOAD_FIELD);
        upload_error(StatusCode::BAD_REQUEST, "No image uploaded".to_string())
    })?;
    debug!("Upload received: {} bytes", image_bytes.len());

    let cancel = CancellationToken::new();
    let _disconnect = cancel.clone().drop_guard();
    let (transcript, _) = with_deadline(
        state.request_timeout,
        CANCEL_GRACE,
        &cancel,
        state.pipeline.transcribe_bytes(&image_bytes, &cancel),
    )
    .await
    .map_err(|e| {
        warn!("Upload transcription failed: {}", e);
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        upload_error(status, e.to_string())
    })?;

    Ok(Json(UploadResponse {
        extracted_text: transcript.text,
    }))
}

fn upload_error(status: StatusCode, error: String) -> (StatusCode, Json<UploadErrorResponse>) {
    (status, Json(UploadErrorResponse { error }))
}
