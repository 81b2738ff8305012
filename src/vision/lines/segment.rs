// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Horizontal text-line segmentation
//!
//! Two interchangeable strategies sit behind `LineSegmenter`:
//! - `ProjectionSegmenter` scans the per-row ink profile for active bands
//! - `ContourSegmenter` smears ink horizontally and takes the row extent of
//!   each connected blob
//!
//! `Segmenter` wraps the configured strategy and owns the policies shared by
//! both: intervals are sorted and overlaps merged, and a visibly inked mask
//! that yields no interval is returned as a single full-height line.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{BinaryMask, RowInterval, BACKGROUND, INK};
use crate::config::{PipelineConfig, ProfileThreshold, SegmentationStrategy};

/// A strategy for locating text-line bands in a binary mask
pub trait LineSegmenter: Send + Sync {
    /// Strategy name for logs and API responses
    fn name(&self) -> &'static str;

    /// Candidate line bands, ordered by `top`
    fn find_intervals(&self, mask: &BinaryMask) -> Vec<RowInterval>;
}

/// Number of ink pixels in every row, top to bottom
pub fn row_profile(mask: &BinaryMask) -> Vec<u32> {
    mask.as_image()
        .rows()
        .map(|row| row.filter(|p| p[0] == INK).count() as u32)
        .collect()
}

/// Sort by `top` and merge overlapping bands into their union
pub fn normalize_intervals(mut intervals: Vec<RowInterval>) -> Vec<RowInterval> {
    intervals.sort_by_key(|interval| (interval.top, interval.bottom));

    let mut merged: Vec<RowInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if last.overlaps(&interval) => {
                last.bottom = last.bottom.max(interval.bottom);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Projection-profile segmentation
#[derive(Debug, Clone)]
pub struct ProjectionSegmenter {
    min_line_height: u32,
    threshold: ProfileThreshold,
}

impl ProjectionSegmenter {
    pub fn new(min_line_height: u32, threshold: ProfileThreshold) -> Self {
        Self {
            min_line_height,
            threshold,
        }
    }

    /// Profile value a row must exceed to be considered part of a line
    pub fn activity_threshold(&self, profile: &[u32]) -> f64 {
        match self.threshold {
            ProfileThreshold::Zero => 0.0,
            ProfileThreshold::HalfMean => {
                if profile.is_empty() {
                    return 0.0;
                }
                let total: u64 = profile.iter().map(|&v| v as u64).sum();
                total as f64 / profile.len() as f64 * 0.5
            }
        }
    }
}

impl LineSegmenter for ProjectionSegmenter {
    fn name(&self) -> &'static str {
        "projection"
    }

    fn find_intervals(&self, mask: &BinaryMask) -> Vec<RowInterval> {
        let profile = row_profile(mask);
        let threshold = self.activity_threshold(&profile);

        let mut intervals = Vec::new();
        let mut start: Option<u32> = None;

        for (row, &value) in profile.iter().enumerate() {
            let row = row as u32;
            let active = value as f64 > threshold;
            match (active, start) {
                (true, None) => start = Some(row),
                (false, Some(top)) => {
                    if row - top > self.min_line_height {
                        intervals.extend(RowInterval::new(top, row));
                    }
                    start = None;
                }
                _ => {}
            }
        }

        // Text touching the bottom edge
        if let Some(top) = start {
            let bottom = profile.len() as u32;
            if bottom - top > self.min_line_height {
                intervals.extend(RowInterval::new(top, bottom));
            }
        }

        debug!(
            "Projection profile: threshold {:.2}, {} intervals",
            threshold,
            intervals.len()
        );
        intervals
    }
}

/// Connected-component segmentation on a horizontally dilated mask
#[derive(Debug, Clone)]
pub struct ContourSegmenter {
    min_line_height: u32,
    kernel_ratio: f32,
}

impl ContourSegmenter {
    pub fn new(min_line_height: u32, kernel_ratio: f32) -> Self {
        Self {
            min_line_height,
            kernel_ratio,
        }
    }

    /// Width of the horizontal structuring element for a page `width` wide
    pub fn kernel_width(&self, width: u32) -> u32 {
        ((width as f32 * self.kernel_ratio).round() as u32).max(1)
    }
}

impl LineSegmenter for ContourSegmenter {
    fn name(&self) -> &'static str {
        "contour"
    }

    fn find_intervals(&self, mask: &BinaryMask) -> Vec<RowInterval> {
        let (width, height) = mask.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let smeared = dilate_horizontal(mask.as_image(), self.kernel_width(width));
        let labels = connected_components(&smeared, Connectivity::Eight, Luma([BACKGROUND]));

        // Row extent per label; label 0 is background
        let mut extents: Vec<Option<(u32, u32)>> = Vec::new();
        for (_, y, label) in labels.enumerate_pixels() {
            let label = label[0] as usize;
            if label == 0 {
                continue;
            }
            if extents.len() <= label {
                extents.resize(label + 1, None);
            }
            extents[label] = Some(match extents[label] {
                Some((top, bottom)) => (top.min(y), bottom.max(y + 1)),
                None => (y, y + 1),
            });
        }

        let mut intervals: Vec<RowInterval> = extents
            .into_iter()
            .flatten()
            .filter_map(|(top, bottom)| RowInterval::new(top, bottom))
            .filter(|interval| interval.height() > self.min_line_height)
            .collect();
        intervals.sort_by_key(|interval| interval.top);

        debug!("Contour segmentation: {} components kept", intervals.len());
        intervals
    }
}

/// Dilate ink along rows only with a `kernel_width`-wide flat element
fn dilate_horizontal(mask: &GrayImage, kernel_width: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let left_reach = (kernel_width / 2) as usize;
    let right_reach = (kernel_width - 1) as usize - left_reach;

    let mut out = GrayImage::new(width, height);
    let mut prefix = vec![0u32; width as usize + 1];
    for y in 0..height {
        for x in 0..width as usize {
            let ink = (mask.get_pixel(x as u32, y)[0] == INK) as u32;
            prefix[x + 1] = prefix[x] + ink;
        }
        for x in 0..width as usize {
            let from = x.saturating_sub(right_reach);
            let to = (x + left_reach + 1).min(width as usize);
            if prefix[to] > prefix[from] {
                out.put_pixel(x as u32, y, Luma([INK]));
            }
        }
    }
    out
}

/// Configured segmentation strategy plus the shared interval policies
#[derive(Clone)]
pub struct Segmenter {
    strategy: Arc<dyn LineSegmenter>,
    min_line_height: u32,
    blank_ink_ratio: f64,
}

impl std::fmt::Debug for Segmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segmenter")
            .field("strategy", &self.strategy.name())
            .field("min_line_height", &self.min_line_height)
            .field("blank_ink_ratio", &self.blank_ink_ratio)
            .finish()
    }
}

impl Segmenter {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let strategy: Arc<dyn LineSegmenter> = match config.segmentation_strategy {
            SegmentationStrategy::Projection => Arc::new(ProjectionSegmenter::new(
                config.min_line_height,
                config.profile_threshold,
            )),
            SegmentationStrategy::Contour => Arc::new(ContourSegmenter::new(
                config.min_line_height,
                config.contour_kernel_ratio,
            )),
        };
        Self::with_strategy(strategy, config.min_line_height, config.blank_ink_ratio)
    }

    pub fn with_strategy(
        strategy: Arc<dyn LineSegmenter>,
        min_line_height: u32,
        blank_ink_ratio: f32,
    ) -> Self {
        Self {
            strategy,
            min_line_height,
            blank_ink_ratio: blank_ink_ratio as f64,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Ordered, disjoint line bands for `mask`
    ///
    /// An empty result means the page carries no usable ink. When the
    /// strategy finds nothing on a page whose ink coverage reaches
    /// `blank_ink_ratio`, the whole mask height is returned as one band.
    pub fn segment(&self, mask: &BinaryMask) -> Vec<RowInterval> {
        let intervals = normalize_intervals(self.strategy.find_intervals(mask));
        if !intervals.is_empty() {
            return intervals;
        }

        let height = mask.height();
        let ink_ratio = mask.ink_ratio();
        if ink_ratio > 0.0 && ink_ratio >= self.blank_ink_ratio && height > self.min_line_height
        {
            warn!(
                "No line bands found on inked page (ink ratio {:.4}), keeping full height",
                ink_ratio
            );
            return RowInterval::new(0, height).into_iter().collect();
        }

        Vec::new()
    }
}
