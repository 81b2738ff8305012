// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::vision::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    ValidationError { field: String, message: String },
    InvalidImage(String),
    ServiceUnavailable(String),
    Cancelled { completed: usize, total: usize },
    /// Page still running after cancellation and its grace period
    Timeout,
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let (error_type, message, details) = match self {
            ApiError::ValidationError { field, message } => {
                let mut details = HashMap::new();
                details.insert(
                    "field".to_string(),
                    serde_json::Value::String(field.clone()),
                );
                ("validation_error", message.clone(), Some(details))
            }
            ApiError::InvalidImage(msg) => ("invalid_image", msg.clone(), None),
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg.clone(), None),
            ApiError::Cancelled { completed, total } => {
                let mut details = HashMap::new();
                details.insert(
                    "completed_lines".to_string(),
                    serde_json::Value::Number((*completed).into()),
                );
                details.insert(
                    "total_lines".to_string(),
                    serde_json::Value::Number((*total).into()),
                );
                (
                    "cancelled",
                    "Page recognition was cancelled".to_string(),
                    Some(details),
                )
            }
            ApiError::Timeout => (
                "timeout",
                "Page recognition did not stop after cancellation".to_string(),
                None,
            ),
            ApiError::InternalError(msg) => ("internal_error", msg.clone(), None),
        };

        ErrorResponse {
            error_type: error_type.to_string(),
            message,
            details,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ValidationError { .. } | ApiError::InvalidImage(_) => 400,
            ApiError::Cancelled { .. } | ApiError::Timeout => 408,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::InternalError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::InvalidImage(msg) => write!(f, "Invalid image: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::Cancelled { completed, total } => write!(
                f,
                "Cancelled after {} of {} lines",
                completed, total
            ),
            ApiError::Timeout => write!(f, "Request timed out"),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Decode(e) => ApiError::InvalidImage(e.to_string()),
            PipelineError::InvalidConfig(e) => ApiError::InternalError(e.to_string()),
            PipelineError::RecognizerUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            PipelineError::Cancelled { completed, total } => {
                ApiError::Cancelled { completed, total }
            }
            PipelineError::Internal(msg) => ApiError::InternalError(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}
