// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Handwriting vision stack
//!
//! This module provides:
//! - Upload decoding (`image_utils`)
//! - Page normalization, line segmentation and line extraction (`lines`)
//! - Line recognition and page assembly (`ocr`)
//! - The end-to-end `HandwritingPipeline` (`pipeline`)
//!
//! Everything runs on CPU.

pub mod image_utils;
pub mod lines;
pub mod ocr;
pub mod pipeline;

pub use image_utils::{decode_base64_image, decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use lines::{BinaryMask, LineImage, RowInterval};
pub use pipeline::{HandwritingPipeline, PageTranscript, PipelineError, TranscribedLine};
