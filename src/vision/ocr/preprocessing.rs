// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Line image preprocessing for the CTC recognition model

use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;

/// Recognition model input height
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Maximum width for recognition model input
///
/// A full 1280px handwriting line scaled to height 48 stays below this.
pub const REC_MAX_WIDTH: u32 = 2048;

/// Minimum width accepted by the model
pub const REC_MIN_WIDTH: u32 = 4;

/// Normalization used by the model: (pixel / 255 - 0.5) / 0.5
const REC_MEAN: f32 = 0.5;
const REC_STD: f32 = 0.5;

/// Width a line `width x height` gets once scaled to the model height
pub fn recognition_width(width: u32, height: u32) -> u32 {
    if height == 0 {
        return REC_MIN_WIDTH;
    }
    let scale = REC_INPUT_HEIGHT as f32 / height as f32;
    ((width as f32 * scale).round() as u32).clamp(REC_MIN_WIDTH, REC_MAX_WIDTH)
}

/// Preprocess a line image for recognition
///
/// Steps:
/// 1. Resize to height 48, width following the aspect ratio (clamped)
/// 2. Normalize to [-1, 1]
/// 3. Convert to NCHW tensor format [1, 3, 48, W]
pub fn preprocess_for_recognition(line: &RgbImage) -> Array4<f32> {
    let new_width = recognition_width(line.width(), line.height());
    let resized = imageops::resize(line, new_width, REC_INPUT_HEIGHT, FilterType::Triangle);

    let mut tensor = Array4::zeros((1, 3, REC_INPUT_HEIGHT as usize, new_width as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (pixel[c] as f32 / 255.0 - REC_MEAN) / REC_STD;
        }
    }

    tensor
}
