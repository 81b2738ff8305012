// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline and server configuration
//!
//! `PipelineConfig` carries every tunable of the line pipeline. Values come
//! from CLI flags with environment fallbacks (see `crate::cli`) or from a
//! serialized document; missing fields take the documented defaults.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Default width cap applied by the normalizer
pub const DEFAULT_MAX_IMAGE_WIDTH: u32 = 1280;

/// Default minimum height (exclusive) for a row band to count as a line
pub const DEFAULT_MIN_LINE_HEIGHT: u32 = 10;

/// Default minimum line-image height handed to the recognizer
pub const DEFAULT_MIN_LINE_PIXEL_HEIGHT: u32 = 32;

/// Default upload size limit (10MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("adaptive_threshold_window must be at least 3, got {0}")]
    WindowTooSmall(u32),

    #[error("adaptive_threshold_constant must not be negative, got {0}")]
    NegativeConstant(i32),

    #[error("{field} must be in (0, 1], got {value}")]
    RatioOutOfRange { field: &'static str, value: f32 },

    #[error("invalid listen address {0}")]
    InvalidAddress(String),
}

/// Line segmentation algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationStrategy {
    /// Row-wise ink projection profile
    #[default]
    Projection,
    /// Horizontal dilation + connected components
    Contour,
}

impl SegmentationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentationStrategy::Projection => "projection",
            SegmentationStrategy::Contour => "contour",
        }
    }
}

/// Binarization method used by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Local mean minus a constant over a square window
    #[default]
    Adaptive,
    /// Single global Otsu level
    Otsu,
}

/// Activity threshold for the projection profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ProfileThreshold {
    /// Any row with at least one ink pixel is active
    Zero,
    /// Rows above half the mean profile value are active
    #[default]
    HalfMean,
}

/// Image the extractor crops line images from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LineSource {
    /// The resized grayscale page (dark ink on light paper)
    #[default]
    Page,
    /// The binary mask (white ink on black)
    Mask,
}

/// Meaning of an input that only holds the values 0 and 255
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BinaryInput {
    /// Already a mask: 255 is ink, passed through unchanged
    #[default]
    Mask,
    /// Bitonal scan: 0 is ink on 255 paper
    Scan,
}

/// Configuration for the line pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pages wider than this are downscaled to exactly this width
    pub max_image_width: u32,
    pub threshold_method: ThresholdMethod,
    /// Side of the square adaptive-threshold window (forced odd)
    pub adaptive_threshold_window: u32,
    /// Amount a pixel must sit below its local mean to count as ink.
    /// Must not be negative: with a negative constant every uniform region
    /// below white turns into ink.
    pub adaptive_threshold_constant: i32,
    /// Polarity assumed for two-level (0/255) input, which skips binarization
    pub binary_input: BinaryInput,
    /// Apply a morphological opening after binarization
    pub denoise: bool,
    pub denoise_radius: u8,
    pub segmentation_strategy: SegmentationStrategy,
    pub profile_threshold: ProfileThreshold,
    /// Bands must be strictly taller than this to be kept
    pub min_line_height: u32,
    /// Contour strategy: dilation width as a fraction of page width
    pub contour_kernel_ratio: f32,
    /// Ink fraction above which an unsegmentable mask is kept as one line
    pub blank_ink_ratio: f32,
    pub line_source: LineSource,
    /// Line images shorter than this are padded below
    pub min_line_pixel_height_for_model: u32,
    /// Maximum concurrent recognizer calls for one page
    pub recognition_workers: usize,
    pub max_upload_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_image_width: DEFAULT_MAX_IMAGE_WIDTH,
            threshold_method: ThresholdMethod::Adaptive,
            adaptive_threshold_window: 25,
            adaptive_threshold_constant: 10,
            binary_input: BinaryInput::Mask,
            denoise: true,
            denoise_radius: 1,
            segmentation_strategy: SegmentationStrategy::Projection,
            profile_threshold: ProfileThreshold::HalfMean,
            min_line_height: DEFAULT_MIN_LINE_HEIGHT,
            contour_kernel_ratio: 0.05,
            blank_ink_ratio: 0.002,
            line_source: LineSource::Page,
            min_line_pixel_height_for_model: DEFAULT_MIN_LINE_PIXEL_HEIGHT,
            recognition_workers: 1,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_image_width == 0 {
            return Err(ConfigError::Zero {
                field: "max_image_width",
            });
        }
        if self.adaptive_threshold_window < 3 {
            return Err(ConfigError::WindowTooSmall(self.adaptive_threshold_window));
        }
        if self.adaptive_threshold_constant < 0 {
            return Err(ConfigError::NegativeConstant(
                self.adaptive_threshold_constant,
            ));
        }
        if self.min_line_pixel_height_for_model == 0 {
            return Err(ConfigError::Zero {
                field: "min_line_pixel_height_for_model",
            });
        }
        if self.recognition_workers == 0 {
            return Err(ConfigError::Zero {
                field: "recognition_workers",
            });
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Zero {
                field: "max_upload_bytes",
            });
        }
        if !(self.contour_kernel_ratio > 0.0 && self.contour_kernel_ratio <= 1.0) {
            return Err(ConfigError::RatioOutOfRange {
                field: "contour_kernel_ratio",
                value: self.contour_kernel_ratio,
            });
        }
        if !(self.blank_ink_ratio > 0.0 && self.blank_ink_ratio <= 1.0) {
            return Err(ConfigError::RatioOutOfRange {
                field: "blank_ink_ratio",
                value: self.blank_ink_ratio,
            });
        }
        Ok(())
    }

    /// Adaptive window radius; even windows are rounded up to the next odd size
    pub fn adaptive_threshold_radius(&self) -> u32 {
        let window = self.adaptive_threshold_window | 1;
        window / 2
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whole-page deadline; remaining lines are abandoned when it passes
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            request_timeout_secs: 120,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
