// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! OCR response types

use serde::{Deserialize, Serialize};

use crate::vision::ocr::LineOutcome;
use crate::vision::PageTranscript;

/// Row band of a line on the normalized page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineBand {
    pub top: u32,
    pub bottom: u32,
}

/// One line of the page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEntry {
    /// Position on the page, top to bottom
    pub index: usize,
    pub band: LineBand,
    /// "text", "empty", "failed" or "skipped"
    pub status: String,
    /// Text placed on this line of the page result
    pub text: String,
}

impl LineEntry {
    fn status_of(outcome: &LineOutcome) -> &'static str {
        match outcome {
            LineOutcome::Text(_) => "text",
            LineOutcome::Empty => "empty",
            LineOutcome::Failed(_) => "failed",
            LineOutcome::Skipped => "skipped",
        }
    }
}

/// Response from handwritten page transcription
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    /// Full page text, one line per detected text line
    pub text: String,
    pub lines: Vec<LineEntry>,
    pub failed_lines: usize,
    /// Dimensions after normalization
    pub width: u32,
    pub height: u32,
    pub processing_time_ms: u64,
    /// Recognizer used
    pub model: String,
    pub segmentation: String,
}

impl OcrResponse {
    pub fn from_transcript(
        transcript: PageTranscript,
        include_lines: bool,
        model: &str,
        segmentation: &str,
    ) -> Self {
        let failed_lines = transcript.failed_lines();
        let lines = if include_lines {
            transcript
                .lines
                .iter()
                .enumerate()
                .map(|(index, line)| LineEntry {
                    index,
                    band: LineBand {
                        top: line.interval.top,
                        bottom: line.interval.bottom,
                    },
                    status: LineEntry::status_of(&line.outcome).to_string(),
                    text: line.text().to_string(),
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            text: transcript.text,
            lines,
            failed_lines,
            width: transcript.width,
            height: transcript.height,
            processing_time_ms: transcript.processing_time_ms,
            model: model.to_string(),
            segmentation: segmentation.to_string(),
        }
    }
}

/// Response body of the multipart upload endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub extracted_text: String,
}

/// Error body of the multipart upload endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadErrorResponse {
    pub error: String,
}
