// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Handscript node

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-line-pipeline-2025-11-02";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2025-11-02";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "projection-segmentation",
    "contour-segmentation",
    "adaptive-threshold",
    "otsu-threshold",
    "onnx-ctc-recognition",
    "recognizer-pool",
    "page-cancellation",
    "multipart-upload",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Handscript Node {} ({})", VERSION_NUMBER, BUILD_DATE)
}
