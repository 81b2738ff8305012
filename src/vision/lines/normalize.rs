// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Page normalization ahead of line detection
//!
//! Steps:
//! 1. Convert to single-channel luminance
//! 2. Downscale to `max_image_width` if wider (linear filter, aspect preserved)
//! 3. Binarize (adaptive mean-minus-constant, or global Otsu) so ink is `INK`
//! 4. Optionally open the mask to drop isolated noise pixels
//!
//! Input that is already two-level (only 0 and 255) skips step 3. By default it
//! is read in mask polarity, 255 being ink, so a mask produced here comes back
//! unchanged whichever value covers more of the page. Together with opening
//! being idempotent, this makes normalizing an already-normalized mask a no-op.
//! Bitonal scans (black text, white paper) need `BinaryInput::Scan`.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use tracing::debug;

use super::{BinaryMask, BACKGROUND, INK};
use crate::config::{BinaryInput, PipelineConfig, ThresholdMethod};

/// Output of the normalizer
///
/// `gray` is the resized grayscale page, `mask` its binarization at the same
/// resolution. Row intervals found on the mask index directly into `gray`.
#[derive(Debug, Clone)]
pub struct NormalizedPage {
    pub gray: GrayImage,
    pub mask: BinaryMask,
    /// Factor applied to the original width (1.0 when no downscale happened)
    pub scale: f32,
}

/// Grayscale, width-capped, binarized view of an input page
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    max_width: u32,
    method: ThresholdMethod,
    window_radius: u32,
    constant: i32,
    binary_input: BinaryInput,
    denoise_radius: Option<u8>,
}

impl ImageNormalizer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_width: config.max_image_width,
            method: config.threshold_method,
            window_radius: config.adaptive_threshold_radius(),
            constant: config.adaptive_threshold_constant,
            binary_input: config.binary_input,
            denoise_radius: (config.denoise && config.denoise_radius > 0)
                .then_some(config.denoise_radius),
        }
    }

    /// Binary mask for `image`
    pub fn normalize(&self, image: &DynamicImage) -> BinaryMask {
        self.prepare(image).mask
    }

    /// Resized grayscale page plus its binary mask
    pub fn prepare(&self, image: &DynamicImage) -> NormalizedPage {
        let (gray, scale) = self.downscale(image.to_luma8());

        let mask = if is_two_level(&gray) {
            debug!("Input already binary, reading it as {:?}", self.binary_input);
            binary_passthrough(&gray, self.binary_input)
        } else {
            match self.method {
                ThresholdMethod::Adaptive => {
                    adaptive_mean_threshold(&gray, self.window_radius, self.constant)
                }
                ThresholdMethod::Otsu => otsu_threshold(&gray),
            }
        };

        let mask = match self.denoise_radius {
            Some(radius) => BinaryMask::from_gray(morphology::open(
                mask.as_image(),
                Norm::L1,
                radius,
            )),
            None => mask,
        };

        debug!(
            "Normalized page: {}x{}, scale {:.3}, ink ratio {:.4}",
            gray.width(),
            gray.height(),
            scale,
            mask.ink_ratio()
        );

        NormalizedPage { gray, mask, scale }
    }

    fn downscale(&self, gray: GrayImage) -> (GrayImage, f32) {
        let (width, height) = gray.dimensions();
        if width <= self.max_width || width == 0 {
            return (gray, 1.0);
        }

        let scale = self.max_width as f32 / width as f32;
        let new_height = ((height as f32 * scale).round() as u32).max(1);
        let resized = imageops::resize(&gray, self.max_width, new_height, FilterType::Triangle);
        (resized, scale)
    }
}

/// True when every pixel is 0 or 255
fn is_two_level(gray: &GrayImage) -> bool {
    gray.pixels().all(|p| p[0] == 0 || p[0] == 255)
}

/// Map a two-level image onto the mask polarity
///
/// A single-valued image has nothing to separate and yields no ink, the same
/// as a uniform page on the threshold path.
fn binary_passthrough(gray: &GrayImage, polarity: BinaryInput) -> BinaryMask {
    let ink_value = match polarity {
        BinaryInput::Mask => INK,
        BinaryInput::Scan => 0,
    };
    let first = gray.pixels().next().map(|p| p[0]);
    if gray.pixels().all(|p| Some(p[0]) == first) {
        return BinaryMask::blank(gray.width(), gray.height());
    }

    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let value = if pixel[0] == ink_value { INK } else { BACKGROUND };
        out.put_pixel(x, y, Luma([value]));
    }
    BinaryMask::from_gray(out)
}

/// Local-mean thresholding over a `(2r+1)^2` window clipped to the image
///
/// A pixel is ink when it is darker than its window mean by more than
/// `constant`. Uniform regions never produce ink for `constant >= 0`; a
/// negative constant marks them all as ink, which is why config validation
/// rejects it.
pub fn adaptive_mean_threshold(gray: &GrayImage, radius: u32, constant: i32) -> BinaryMask {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return BinaryMask::blank(width, height);
    }

    // Summed-area table with a zero border row and column
    let stride = width as usize + 1;
    let mut integral = vec![0u64; stride * (height as usize + 1)];
    for y in 0..height as usize {
        let mut row_sum = 0u64;
        for x in 0..width as usize {
            row_sum += gray.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..height {
        let top = y.saturating_sub(radius) as usize;
        let bottom = (y + radius + 1).min(height) as usize;
        for x in 0..width {
            let left = x.saturating_sub(radius) as usize;
            let right = (x + radius + 1).min(width) as usize;

            let sum = integral[bottom * stride + right] + integral[top * stride + left]
                - integral[top * stride + right]
                - integral[bottom * stride + left];
            let count = ((bottom - top) * (right - left)) as i64;
            let pixel = gray.get_pixel(x, y)[0] as i64;

            // pixel < mean - constant, kept in integers
            let is_ink = pixel * count < sum as i64 - constant as i64 * count;
            out.put_pixel(x, y, Luma([if is_ink { INK } else { BACKGROUND }]));
        }
    }

    BinaryMask::from_gray(out)
}

/// Global inverse Otsu binarization: pixels at or below the level are ink
pub fn otsu_threshold(gray: &GrayImage) -> BinaryMask {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if min >= max {
        // Uniform page, nothing to separate
        return BinaryMask::blank(gray.width(), gray.height());
    }

    let level = otsu_level(gray);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let value = if pixel[0] <= level { INK } else { BACKGROUND };
        out.put_pixel(x, y, Luma([value]));
    }
    BinaryMask::from_gray(out)
}
