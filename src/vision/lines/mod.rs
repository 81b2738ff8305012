// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text-line detection for handwritten pages
//!
//! This module turns a decoded page into recognizer-ready line images:
//! - `normalize` - grayscale, width cap, binarization, denoising
//! - `segment` - horizontal line boundaries (projection profile or contours)
//! - `extract` - per-line crops, height padding, 3-channel conversion
//!
//! Binary masks always carry ink as `INK` (255) on a `BACKGROUND` (0) field.

pub mod extract;
pub mod normalize;
pub mod segment;

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

pub use extract::LineExtractor;
pub use normalize::{ImageNormalizer, NormalizedPage};
pub use segment::{
    normalize_intervals, row_profile, ContourSegmenter, LineSegmenter, ProjectionSegmenter,
    Segmenter,
};

/// Mask value for ink pixels
pub const INK: u8 = 255;

/// Mask value for background pixels
pub const BACKGROUND: u8 = 0;

/// A half-open band of rows `[top, bottom)` holding one text line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowInterval {
    pub top: u32,
    pub bottom: u32,
}

impl RowInterval {
    /// Create an interval, rejecting empty or inverted bands
    pub fn new(top: u32, bottom: u32) -> Option<Self> {
        (top < bottom).then_some(Self { top, bottom })
    }

    /// Number of rows covered
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    /// Whether two intervals share at least one row
    pub fn overlaps(&self, other: &RowInterval) -> bool {
        self.top < other.bottom && other.top < self.bottom
    }
}

/// Two-level page mask produced by the normalizer
///
/// Every pixel is either `INK` or `BACKGROUND`; the constructors enforce it.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryMask {
    image: GrayImage,
}

impl BinaryMask {
    /// Build a mask from a grayscale buffer: any non-zero pixel becomes ink
    pub fn from_gray(mut image: GrayImage) -> Self {
        for pixel in image.pixels_mut() {
            if pixel[0] != BACKGROUND {
                *pixel = Luma([INK]);
            }
        }
        Self { image }
    }

    /// An all-background mask
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, Luma([BACKGROUND])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Whether the pixel at `(x, y)` is ink
    pub fn is_ink(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y)[0] == INK
    }

    /// Total number of ink pixels
    pub fn ink_count(&self) -> u64 {
        self.image.pixels().filter(|p| p[0] == INK).count() as u64
    }

    /// Fraction of the mask covered by ink (0.0 for an empty mask)
    pub fn ink_ratio(&self) -> f64 {
        let total = self.width() as u64 * self.height() as u64;
        if total == 0 {
            return 0.0;
        }
        self.ink_count() as f64 / total as f64
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }
}

/// A cropped, padded, 3-channel line ready for the recognizer
#[derive(Debug, Clone)]
pub struct LineImage {
    /// Position of the line on the page (0 = topmost)
    pub index: usize,
    /// Source rows on the normalized page
    pub interval: RowInterval,
    pub image: RgbImage,
}

impl LineImage {
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }
}
