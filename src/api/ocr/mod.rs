// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR API endpoint module
//!
//! Provides POST /v1/ocr (JSON, base64 image) and POST /upload (multipart).

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{ocr_handler, upload_handler, UPLOAD_FIELD};
pub use request::OcrRequest;
pub use response::{LineEntry, OcrResponse, UploadErrorResponse, UploadResponse};
