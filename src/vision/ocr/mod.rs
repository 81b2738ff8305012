// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Line recognition
//!
//! Components:
//! - `recognizer` - The `LineRecognizer` boundary and `RecognizerPool`
//! - `recognition` - ONNX CTC line model
//! - `preprocessing` - Line image to model tensor
//! - `orchestrator` - Runs a page of lines and joins the text

pub mod orchestrator;
pub mod preprocessing;
pub mod recognition;
pub mod recognizer;

pub use orchestrator::{
    LineOutcome, PageResult, RecognitionOrchestrator, NO_TEXT_SENTINEL,
    RECOGNITION_ERROR_SENTINEL,
};
pub use recognition::{OnnxLineRecognizer, RecognizedText};
pub use recognizer::{LineRecognizer, RecognitionError, RecognizerPool};
