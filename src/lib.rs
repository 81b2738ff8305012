// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod version;
pub mod vision;

// Re-export main types
pub use config::{PipelineConfig, SegmentationStrategy, ServerConfig};
pub use vision::ocr::{LineRecognizer, RecognitionError};
pub use vision::{HandwritingPipeline, PageTranscript, PipelineError};
