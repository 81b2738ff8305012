// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Normalize -> segment -> extract through the public stage types

use handscript_node::config::{PipelineConfig, SegmentationStrategy, ThresholdMethod};
use handscript_node::vision::lines::{
    ImageNormalizer, LineExtractor, RowInterval, Segmenter, BACKGROUND, INK,
};
use image::{DynamicImage, GrayImage, Luma};

use crate::common::{synthetic_page, PAPER, PEN, THREE_BANDS};

/// Page with three bands plus scattered specks from a fixed-seed LCG
fn speckled_page(seed: u64) -> DynamicImage {
    let mut page = match synthetic_page(&THREE_BANDS) {
        DynamicImage::ImageLuma8(gray) => gray,
        other => other.to_luma8(),
    };
    let mut state = seed;
    for _ in 0..400 {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        let x = ((state >> 33) % 400) as u32;
        let y = ((state >> 17) % 300) as u32;
        page.put_pixel(x, y, Luma([PEN]));
    }
    DynamicImage::ImageLuma8(page)
}

fn assert_well_formed(intervals: &[RowInterval], height: u32, min_line_height: u32) {
    for interval in intervals {
        assert!(interval.top < interval.bottom);
        assert!(interval.bottom <= height);
        assert!(interval.height() > min_line_height);
    }
    for pair in intervals.windows(2) {
        assert!(pair[0].bottom <= pair[1].top, "{:?} overlaps", pair);
    }
}

#[cfg(test)]
mod line_stage_tests {
    use super::*;

    #[test]
    fn test_intervals_well_formed_for_both_strategies() {
        for strategy in [SegmentationStrategy::Projection, SegmentationStrategy::Contour] {
            let config = PipelineConfig {
                segmentation_strategy: strategy,
                ..Default::default()
            };
            let normalizer = ImageNormalizer::from_config(&config);
            let segmenter = Segmenter::from_config(&config);

            for seed in [1u64, 7, 42, 1234] {
                let mask = normalizer.normalize(&speckled_page(seed));
                let intervals = segmenter.segment(&mask);
                assert_well_formed(&intervals, mask.height(), config.min_line_height);
                assert!(!intervals.is_empty(), "{:?} seed {}", strategy, seed);
            }
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = ImageNormalizer::from_config(&PipelineConfig::default());
        let once = normalizer.normalize(&synthetic_page(&THREE_BANDS));
        let twice = normalizer.normalize(&DynamicImage::ImageLuma8(once.as_image().clone()));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_is_idempotent_when_ink_dominates() {
        // Dark page, one light strip: the first mask is mostly ink
        let mut page = GrayImage::from_pixel(200, 100, Luma([30]));
        for y in 40..60 {
            for x in 0..200 {
                page.put_pixel(x, y, Luma([220]));
            }
        }
        let normalizer = ImageNormalizer::from_config(&PipelineConfig {
            threshold_method: ThresholdMethod::Otsu,
            ..Default::default()
        });

        let once = normalizer.normalize(&DynamicImage::ImageLuma8(page));
        let twice = normalizer.normalize(&DynamicImage::ImageLuma8(once.as_image().clone()));
        assert!(once.ink_ratio() > 0.5);
        assert_eq!(once.ink_count(), twice.ink_count());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_mask_is_two_level() {
        let normalizer = ImageNormalizer::from_config(&PipelineConfig::default());
        let mask = normalizer.normalize(&speckled_page(99));
        assert!(mask
            .as_image()
            .pixels()
            .all(|p| p[0] == INK || p[0] == BACKGROUND));
    }

    #[test]
    fn test_extracted_lines_follow_intervals() {
        let config = PipelineConfig::default();
        let page = synthetic_page(&THREE_BANDS);
        let mask = ImageNormalizer::from_config(&config).normalize(&page);
        let intervals = Segmenter::from_config(&config).segment(&mask);

        let extractor = LineExtractor::new(config.min_line_pixel_height_for_model, PAPER);
        let lines = extractor.extract(&page, &intervals);

        assert_eq!(lines.len(), 3);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line.index, i);
            assert_eq!(line.interval, intervals[i]);
            assert_eq!(line.height(), config.min_line_pixel_height_for_model);
            // padding rows take the paper value
            let last = line.image.get_pixel(0, line.height() - 1);
            assert_eq!(last.0, [PAPER, PAPER, PAPER]);
        }
    }

    #[test]
    fn test_ink_on_every_row_is_one_line() {
        // No gap to split on
        let mut page = GrayImage::from_pixel(200, 120, Luma([PAPER]));
        for y in 0..120 {
            for x in 40..60 {
                page.put_pixel(x, y, Luma([PEN]));
            }
        }
        let config = PipelineConfig::default();
        let mask = ImageNormalizer::from_config(&config).normalize(&DynamicImage::ImageLuma8(page));
        let intervals = Segmenter::from_config(&config).segment(&mask);

        assert_eq!(intervals, vec![RowInterval::new(0, 120).unwrap()]);
    }
}
