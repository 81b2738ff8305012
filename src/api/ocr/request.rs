// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR request types and validation

use serde::{Deserialize, Serialize};

use crate::api::errors::ApiError;

/// Request for handwritten page transcription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrRequest {
    /// Base64-encoded image data, optionally as a data URL
    #[serde(default)]
    pub image: Option<String>,

    /// Include per-line entries in the response
    #[serde(default = "default_include_lines")]
    pub include_lines: bool,
}

fn default_include_lines() -> bool {
    true
}

impl OcrRequest {
    /// Validate the OCR request against the upload size limit
    pub fn validate(&self, max_upload_bytes: usize) -> Result<&str, ApiError> {
        let image = match self.image.as_deref() {
            Some(image) if !image.trim().is_empty() => image,
            _ => {
                return Err(ApiError::ValidationError {
                    field: "image".to_string(),
                    message: "image is required".to_string(),
                })
            }
        };

        // base64 inflates by 4/3
        let max_encoded = max_upload_bytes.saturating_mul(4) / 3 + 4;
        if image.len() > max_encoded {
            return Err(ApiError::ValidationError {
                field: "image".to_string(),
                message: format!(
                    "image exceeds maximum size of {} bytes",
                    max_upload_bytes
                ),
            });
        }

        Ok(image)
    }
}
