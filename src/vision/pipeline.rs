// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end handwriting pipeline
//!
//! decode -> normalize -> segment -> extract -> recognize -> join
//!
//! Decoding happens before anything else so a bad upload never reaches the
//! image stages. The CPU-bound stages run on the blocking pool; the
//! recognizer handle is injected at construction and shared across requests.

use image::DynamicImage;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::image_utils::{decode_base64_image, decode_image_bytes, ImageError, ImageInfo};
use super::lines::{
    ImageNormalizer, LineExtractor, LineImage, NormalizedPage, RowInterval, Segmenter, BACKGROUND,
};
use super::ocr::orchestrator::{LineOutcome, PageResult, RecognitionOrchestrator};
use super::ocr::recognizer::LineRecognizer;
use crate::config::{ConfigError, LineSource, PipelineConfig};

/// Request-level pipeline failures
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Decode(#[from] ImageError),

    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("recognizer unavailable: {0}")]
    RecognizerUnavailable(String),

    #[error("page recognition cancelled after {completed} of {total} lines")]
    Cancelled { completed: usize, total: usize },

    #[error("pipeline stage failed: {0}")]
    Internal(String),
}

/// One recognized line with its position on the normalized page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscribedLine {
    pub interval: RowInterval,
    pub outcome: LineOutcome,
}

impl TranscribedLine {
    pub fn text(&self) -> &str {
        self.outcome.display_text()
    }
}

/// Full result for one page
#[derive(Debug, Clone, Serialize)]
pub struct PageTranscript {
    /// Joined page text (the page result)
    pub text: String,
    pub lines: Vec<TranscribedLine>,
    /// Dimensions after normalization
    pub width: u32,
    pub height: u32,
    pub processing_time_ms: u64,
}

impl PageTranscript {
    pub fn failed_lines(&self) -> usize {
        self.lines.iter().filter(|l| l.outcome.is_failure()).count()
    }
}

/// Lines found on a page, ready for recognition
#[derive(Debug, Clone)]
pub struct PreparedPage {
    pub normalized: NormalizedPage,
    pub intervals: Vec<RowInterval>,
    pub lines: Vec<LineImage>,
}

/// Image stages of the pipeline, cheap to clone onto a worker thread
#[derive(Debug, Clone)]
struct LineStages {
    normalizer: ImageNormalizer,
    segmenter: Segmenter,
    extractor: LineExtractor,
    source: LineSource,
}

impl LineStages {
    fn prepare(&self, image: &DynamicImage) -> PreparedPage {
        let normalized = self.normalizer.prepare(image);
        let intervals = self.segmenter.segment(&normalized.mask);

        let lines = match self.source {
            LineSource::Page => {
                let page = DynamicImage::ImageLuma8(normalized.gray.clone());
                self.extractor.extract(&page, &intervals)
            }
            LineSource::Mask => {
                let mask = DynamicImage::ImageLuma8(normalized.mask.as_image().clone());
                self.extractor.extract(&mask, &intervals)
            }
        };

        debug!(
            "Prepared page {}x{}: {} line(s) via {}",
            normalized.gray.width(),
            normalized.gray.height(),
            lines.len(),
            self.segmenter.strategy_name()
        );

        PreparedPage {
            normalized,
            intervals,
            lines,
        }
    }
}

/// Handwritten page transcription
pub struct HandwritingPipeline {
    config: PipelineConfig,
    stages: LineStages,
    orchestrator: RecognitionOrchestrator,
}

impl std::fmt::Debug for HandwritingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandwritingPipeline")
            .field("config", &self.config)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl HandwritingPipeline {
    pub fn new(
        config: PipelineConfig,
        recognizer: Arc<dyn LineRecognizer>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        // Padding rows take the paper value of whichever image is cropped
        let padding = match config.line_source {
            LineSource::Page => u8::MAX,
            LineSource::Mask => BACKGROUND,
        };

        let stages = LineStages {
            normalizer: ImageNormalizer::from_config(&config),
            segmenter: Segmenter::from_config(&config),
            extractor: LineExtractor::new(config.min_line_pixel_height_for_model, padding),
            source: config.line_source,
        };
        let orchestrator = RecognitionOrchestrator::new(recognizer, config.recognition_workers);

        info!(
            "Handwriting pipeline ready: {} segmentation, {} recognizer, {} worker(s)",
            stages.segmenter.strategy_name(),
            orchestrator.recognizer().name(),
            orchestrator.concurrency()
        );

        Ok(Self {
            config,
            stages,
            orchestrator,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn segmentation_strategy(&self) -> &'static str {
        self.stages.segmenter.strategy_name()
    }

    pub fn recognizer_name(&self) -> &str {
        self.orchestrator.recognizer().name()
    }

    /// Run the image stages synchronously
    pub fn prepare(&self, image: &DynamicImage) -> PreparedPage {
        self.stages.prepare(image)
    }

    /// Transcribe a decoded page
    pub async fn transcribe(&self, image: DynamicImage) -> Result<PageTranscript, PipelineError> {
        self.transcribe_with_cancel(image, &CancellationToken::new())
            .await
    }

    /// Transcribe a decoded page, abandoning unstarted lines once `cancel` fires
    pub async fn transcribe_with_cancel(
        &self,
        image: DynamicImage,
        cancel: &CancellationToken,
    ) -> Result<PageTranscript, PipelineError> {
        let started = Instant::now();

        let stages = self.stages.clone();
        let prepared = tokio::task::spawn_blocking(move || stages.prepare(&image))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))?;

        let (width, height) = prepared.normalized.gray.dimensions();
        let intervals = prepared.intervals;

        let page: PageResult = self
            .orchestrator
            .recognize_page_with_cancel(prepared.lines, cancel)
            .await?;

        if page.cancelled {
            return Err(PipelineError::Cancelled {
                completed: page.completed_lines(),
                total: page.lines.len(),
            });
        }

        let text = page.text();
        let lines = intervals
            .into_iter()
            .zip(page.lines)
            .map(|(interval, outcome)| TranscribedLine { interval, outcome })
            .collect();

        let transcript = PageTranscript {
            text,
            lines,
            width,
            height,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Page transcribed: {} line(s), {} failed, {}ms",
            transcript.lines.len(),
            transcript.failed_lines(),
            transcript.processing_time_ms
        );

        Ok(transcript)
    }

    /// Decode raw upload bytes, then transcribe
    pub async fn transcribe_bytes(
        &self,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> Result<(PageTranscript, ImageInfo), PipelineError> {
        let (image, info) = decode_image_bytes(bytes, self.config.max_upload_bytes)?;
        debug!(
            "Decoded upload: {}x{} {:?}, {} bytes",
            info.width, info.height, info.format, info.size_bytes
        );
        let transcript = self.transcribe_with_cancel(image, cancel).await?;
        Ok((transcript, info))
    }

    /// Decode a base64 payload, then transcribe
    pub async fn transcribe_base64(
        &self,
        payload: &str,
        cancel: &CancellationToken,
    ) -> Result<(PageTranscript, ImageInfo), PipelineError> {
        let (image, info) = decode_base64_image(payload, self.config.max_upload_bytes)?;
        let transcript = self.transcribe_with_cancel(image, cancel).await?;
        Ok((transcript, info))
    }
}
