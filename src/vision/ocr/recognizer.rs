// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Line recognizer boundary
//!
//! The pipeline sees a recognizer only through `LineRecognizer`: one
//! 3-channel line image in, one string out. Implementations are loaded once
//! at process start and shared behind an `Arc`.

use image::RgbImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by a recognizer for a single call
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecognitionError {
    #[error("malformed line image: {0}")]
    MalformedInput(String),

    #[error("recognizer out of resources: {0}")]
    ResourceExhausted(String),

    #[error("recognizer internal fault: {0}")]
    Internal(String),

    #[error("recognizer unavailable: {0}")]
    Unavailable(String),
}

impl RecognitionError {
    /// Whether the failure concerns the recognizer itself rather than the line
    pub fn is_systemic(&self) -> bool {
        matches!(self, RecognitionError::Unavailable(_))
    }
}

/// Text recognition for a single line image
pub trait LineRecognizer: Send + Sync {
    /// Decode the text in `line`
    fn recognize(&self, line: &RgbImage) -> Result<String, RecognitionError>;

    /// How many calls may safely run at the same time
    fn max_concurrency(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "line-recognizer"
    }
}

/// Several independently loaded recognizers served round-robin
///
/// Each member keeps its own serialization; the pool's concurrency is the
/// sum of its members'.
pub struct RecognizerPool {
    members: Vec<Arc<dyn LineRecognizer>>,
    next: AtomicUsize,
}

impl std::fmt::Debug for RecognizerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerPool")
            .field("members", &self.members.len())
            .finish_non_exhaustive()
    }
}

impl RecognizerPool {
    pub fn new(members: Vec<Arc<dyn LineRecognizer>>) -> Result<Self, RecognitionError> {
        if members.is_empty() {
            return Err(RecognitionError::Unavailable(
                "recognizer pool has no members".to_string(),
            ));
        }
        Ok(Self {
            members,
            next: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl LineRecognizer for RecognizerPool {
    fn recognize(&self, line: &RgbImage) -> Result<String, RecognitionError> {
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.members.len();
        self.members[slot].recognize(line)
    }

    fn max_concurrency(&self) -> usize {
        self.members.iter().map(|m| m.max_concurrency()).sum()
    }

    fn name(&self) -> &str {
        self.members[0].name()
    }
}
