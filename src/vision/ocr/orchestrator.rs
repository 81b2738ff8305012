// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Page-level recognition orchestration
//!
//! Feeds line images to the shared recognizer and assembles the page text.
//! Each line ends up as exactly one `LineOutcome` in a slot indexed by its
//! position, so the joined text follows page order regardless of which call
//! finishes first. Per-line faults become sentinels; a systemic recognizer
//! failure aborts the page.
//!
//! Calls run on the blocking thread pool. At most
//! `min(workers, recognizer.max_concurrency())` run at once; with the
//! default of one worker the lines are recognized strictly top to bottom.

use futures::stream::{self, StreamExt};
use image::RgbImage;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::recognizer::{LineRecognizer, RecognitionError};
use crate::vision::lines::LineImage;
use crate::vision::pipeline::PipelineError;

/// Page or line text when nothing was recognized
pub const NO_TEXT_SENTINEL: &str = "[No text detected]";

/// Line text when the recognizer failed on that line
pub const RECOGNITION_ERROR_SENTINEL: &str = "[Error: Could not recognize line]";

/// Result of recognizing one line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum LineOutcome {
    /// Trimmed, non-empty recognizer output
    Text(String),
    /// The recognizer ran but returned only whitespace
    Empty,
    /// The recognizer failed on this line; carries the reason
    Failed(String),
    /// Not attempted because the page was cancelled
    Skipped,
}

impl LineOutcome {
    /// Classify a raw recognizer result
    ///
    /// Systemic failures are handed back as `Err` so the caller can abort.
    pub fn from_recognition(
        result: Result<String, RecognitionError>,
    ) -> Result<Self, RecognitionError> {
        match result {
            Ok(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Ok(LineOutcome::Empty)
                } else {
                    Ok(LineOutcome::Text(trimmed.to_string()))
                }
            }
            Err(e) if e.is_systemic() => Err(e),
            Err(e) => Ok(LineOutcome::Failed(e.to_string())),
        }
    }

    /// Text placed on this line of the page result
    pub fn display_text(&self) -> &str {
        match self {
            LineOutcome::Text(text) => text,
            LineOutcome::Empty => NO_TEXT_SENTINEL,
            LineOutcome::Failed(_) => RECOGNITION_ERROR_SENTINEL,
            LineOutcome::Skipped => "",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, LineOutcome::Failed(_))
    }
}

/// Ordered per-line outcomes for one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResult {
    pub lines: Vec<LineOutcome>,
    /// Some lines were skipped because the page was cancelled
    pub cancelled: bool,
}

impl PageResult {
    /// A page with no lines
    pub fn empty() -> Self {
        Self {
            lines: Vec::new(),
            cancelled: false,
        }
    }

    /// Line texts joined top to bottom, or the page sentinel for no lines
    pub fn text(&self) -> String {
        if self.lines.is_empty() {
            return NO_TEXT_SENTINEL.to_string();
        }
        self.lines
            .iter()
            .map(LineOutcome::display_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn failed_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.is_failure()).count()
    }

    pub fn completed_lines(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| !matches!(l, LineOutcome::Skipped))
            .count()
    }
}

/// Runs the recognizer over the lines of a page
#[derive(Clone)]
pub struct RecognitionOrchestrator {
    recognizer: Arc<dyn LineRecognizer>,
    workers: usize,
}

impl std::fmt::Debug for RecognitionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionOrchestrator")
            .field("recognizer", &self.recognizer.name())
            .field("workers", &self.workers)
            .finish()
    }
}

impl RecognitionOrchestrator {
    pub fn new(recognizer: Arc<dyn LineRecognizer>, workers: usize) -> Self {
        Self {
            recognizer,
            workers: workers.max(1),
        }
    }

    pub fn recognizer(&self) -> &Arc<dyn LineRecognizer> {
        &self.recognizer
    }

    /// Number of recognizer calls allowed in flight for one page
    pub fn concurrency(&self) -> usize {
        self.workers.min(self.recognizer.max_concurrency()).max(1)
    }

    /// Recognize one line synchronously
    pub fn recognize_line(
        recognizer: &dyn LineRecognizer,
        line: &RgbImage,
    ) -> Result<LineOutcome, RecognitionError> {
        LineOutcome::from_recognition(recognizer.recognize(line))
    }

    /// Recognize every line of a page
    pub async fn recognize_page(&self, lines: Vec<LineImage>) -> Result<PageResult, PipelineError> {
        self.recognize_page_with_cancel(lines, &CancellationToken::new())
            .await
    }

    /// Recognize every line, skipping lines not yet started once `cancel` fires
    pub async fn recognize_page_with_cancel(
        &self,
        lines: Vec<LineImage>,
        cancel: &CancellationToken,
    ) -> Result<PageResult, PipelineError> {
        if lines.is_empty() {
            return Ok(PageResult::empty());
        }

        let total = lines.len();
        let concurrency = self.concurrency();
        debug!(
            "Recognizing {} lines with {} via {} worker(s)",
            total,
            self.recognizer.name(),
            concurrency
        );

        let mut slots: Vec<Option<LineOutcome>> = vec![None; total];

        let mut pending = stream::iter(lines.into_iter().enumerate().map(|(position, line)| {
            let recognizer = Arc::clone(&self.recognizer);
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return (position, Ok(LineOutcome::Skipped));
                }
                let joined = tokio::task::spawn_blocking(move || {
                    Self::recognize_line(recognizer.as_ref(), &line.image)
                })
                .await;
                let outcome = match joined {
                    Ok(outcome) => outcome,
                    Err(e) => Ok(LineOutcome::Failed(format!("recognizer task failed: {}", e))),
                };
                (position, outcome)
            }
        }))
        .buffer_unordered(concurrency);

        while let Some((position, outcome)) = pending.next().await {
            match outcome {
                Ok(outcome) => {
                    if let LineOutcome::Failed(reason) = &outcome {
                        warn!("Line {} failed to recognize: {}", position, reason);
                    }
                    slots[position] = Some(outcome);
                }
                Err(e) => {
                    warn!("Recognizer unavailable at line {}: {}", position, e);
                    return Err(PipelineError::RecognizerUnavailable(e.to_string()));
                }
            }
        }

        let lines: Vec<LineOutcome> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or(LineOutcome::Skipped))
            .collect();
        let cancelled = lines.iter().any(|l| matches!(l, LineOutcome::Skipped));

        Ok(PageResult { lines, cancelled })
    }
}
