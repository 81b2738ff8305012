// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures: a mock recognizer and synthetic handwriting pages

#![allow(dead_code)]

use handscript_node::vision::ocr::{LineRecognizer, RecognitionError};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage};
use mockall::mock;
use std::io::Cursor;

mock! {
    pub Recognizer {}

    impl LineRecognizer for Recognizer {
        fn recognize(&self, line: &RgbImage) -> Result<String, RecognitionError>;
        fn max_concurrency(&self) -> usize;
    }
}

/// Paper value of synthetic pages
pub const PAPER: u8 = 245;

/// Ink value of synthetic pages
pub const PEN: u8 = 20;

/// The three bands used by most tests: rows 30-50, 100-120, 200-220
pub const THREE_BANDS: [(u32, u32); 3] = [(30, 50), (100, 120), (200, 220)];

/// A `width x height` page with a dark stroke over each `(top, bottom, x_end)` band
pub fn page_with_strokes(width: u32, height: u32, strokes: &[(u32, u32, u32)]) -> DynamicImage {
    let mut page = GrayImage::from_pixel(width, height, Luma([PAPER]));
    for &(top, bottom, x_end) in strokes {
        for y in top..bottom {
            for x in 20..x_end.min(width) {
                page.put_pixel(x, y, Luma([PEN]));
            }
        }
    }
    DynamicImage::ImageLuma8(page)
}

/// 400x300 white page with dark bands spanning x 20..380
pub fn synthetic_page(bands: &[(u32, u32)]) -> DynamicImage {
    let strokes: Vec<(u32, u32, u32)> = bands.iter().map(|&(t, b)| (t, b, 380)).collect();
    page_with_strokes(400, 300, &strokes)
}

/// Encode a page as PNG bytes, the way a client would upload it
pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Rightmost dark column of a line image, or None for a blank line
pub fn ink_extent(line: &RgbImage) -> Option<u32> {
    line.enumerate_pixels()
        .filter(|(_, _, p)| p[0] < 128)
        .map(|(x, _, _)| x)
        .max()
}

/// A recognizer that reads back each line's ink extent, so the text
/// identifies which line it came from regardless of call order
pub fn extent_reader(max_concurrency: usize) -> MockRecognizer {
    let mut mock = MockRecognizer::new();
    mock.expect_max_concurrency().return_const(max_concurrency);
    mock.expect_recognize().returning(|line| {
        Ok(ink_extent(line)
            .map(|x| format!("ends at {}", x))
            .unwrap_or_default())
    });
    mock
}

/// A serial mock recognizer with no `recognize` expectations yet
pub fn mock_recognizer() -> MockRecognizer {
    let mut mock = MockRecognizer::new();
    mock.expect_max_concurrency().return_const(1usize);
    mock
}
