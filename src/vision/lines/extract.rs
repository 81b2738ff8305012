// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Line image extraction

use image::imageops;
use image::{DynamicImage, Rgb, RgbImage};
use std::borrow::Cow;

use super::{LineImage, RowInterval};

/// Crops row intervals out of a page and pads them for the recognizer
#[derive(Debug, Clone)]
pub struct LineExtractor {
    min_height: u32,
    background: u8,
}

impl LineExtractor {
    /// `background` fills padding rows; use the source image's paper value
    pub fn new(min_height: u32, background: u8) -> Self {
        Self {
            min_height,
            background,
        }
    }

    pub fn min_height(&self) -> u32 {
        self.min_height
    }

    /// One line image per interval, in interval order
    ///
    /// RGB sources are cropped as-is; grayscale sources have each value
    /// replicated into all three channels.
    pub fn extract(&self, source: &DynamicImage, intervals: &[RowInterval]) -> Vec<LineImage> {
        let rgb: Cow<'_, RgbImage> = match source {
            DynamicImage::ImageRgb8(image) => Cow::Borrowed(image),
            other => Cow::Owned(other.to_rgb8()),
        };

        intervals
            .iter()
            .enumerate()
            .map(|(index, interval)| LineImage {
                index,
                interval: *interval,
                image: self.crop_line(&rgb, interval),
            })
            .collect()
    }

    fn crop_line(&self, page: &RgbImage, interval: &RowInterval) -> RgbImage {
        let (width, height) = page.dimensions();
        let top = interval.top.min(height);
        let bottom = interval.bottom.min(height);
        let crop = imageops::crop_imm(page, 0, top, width, bottom - top).to_image();

        if crop.height() >= self.min_height {
            return crop;
        }

        // Pad below only so the line keeps its top alignment
        let mut padded = RgbImage::from_pixel(width, self.min_height, Rgb([self.background; 3]));
        imageops::replace(&mut padded, &crop, 0, 0);
        padded
    }
}
