// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod transcribe;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::api::start_server;
use crate::config::{
    BinaryInput, LineSource, PipelineConfig, ProfileThreshold, SegmentationStrategy, ServerConfig,
    ThresholdMethod, DEFAULT_MAX_IMAGE_WIDTH, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_MIN_LINE_HEIGHT,
    DEFAULT_MIN_LINE_PIXEL_HEIGHT,
};
use crate::vision::ocr::{LineRecognizer, OnnxLineRecognizer, RecognizerPool};
use crate::vision::HandwritingPipeline;

/// Handscript Node CLI
///
/// Every option falls back to an environment variable, so the node can be
/// configured entirely from the environment.
#[derive(Parser, Debug)]
#[command(name = "handscript-node")]
#[command(version)]
#[command(about = "Handwritten page transcription service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub model: ModelArgs,

    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Transcribe a single image file and print the text
    Transcribe(transcribe::TranscribeArgs),
}

/// Recognition model files
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// ONNX CTC line-recognition model
    #[arg(long, env = "MODEL_PATH", default_value = "./models/handwriting_rec.onnx")]
    pub model_path: PathBuf,

    /// Character dictionary, one entry per line
    #[arg(long, env = "DICT_PATH", default_value = "./models/handwriting_dict.txt")]
    pub dict_path: PathBuf,

    /// Independently loaded model instances (parallel line recognition)
    #[arg(long, env = "RECOGNIZER_INSTANCES", default_value_t = 1)]
    pub recognizer_instances: usize,
}

/// Line pipeline tunables
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[arg(long, env = "MAX_IMAGE_WIDTH", default_value_t = DEFAULT_MAX_IMAGE_WIDTH)]
    pub max_image_width: u32,

    #[arg(long, env = "THRESHOLD_METHOD", value_enum, default_value_t = ThresholdMethod::Adaptive)]
    pub threshold_method: ThresholdMethod,

    #[arg(long, env = "ADAPTIVE_THRESHOLD_WINDOW", default_value_t = 25)]
    pub adaptive_threshold_window: u32,

    /// Must not be negative (checked when the pipeline starts)
    #[arg(long, env = "ADAPTIVE_THRESHOLD_CONSTANT", default_value_t = 10, allow_negative_numbers = true)]
    pub adaptive_threshold_constant: i32,

    /// How already two-level (0/255) pages are read
    #[arg(long, env = "BINARY_INPUT", value_enum, default_value_t = BinaryInput::Mask)]
    pub binary_input: BinaryInput,

    /// Morphological opening after binarization
    #[arg(long, env = "DENOISE", default_value_t = true, action = ArgAction::Set)]
    pub denoise: bool,

    #[arg(long, env = "DENOISE_RADIUS", default_value_t = 1)]
    pub denoise_radius: u8,

    #[arg(long, env = "SEGMENTATION_STRATEGY", value_enum, default_value_t = SegmentationStrategy::Projection)]
    pub segmentation_strategy: SegmentationStrategy,

    #[arg(long, env = "PROFILE_THRESHOLD", value_enum, default_value_t = ProfileThreshold::HalfMean)]
    pub profile_threshold: ProfileThreshold,

    #[arg(long, env = "MIN_LINE_HEIGHT", default_value_t = DEFAULT_MIN_LINE_HEIGHT)]
    pub min_line_height: u32,

    #[arg(long, env = "CONTOUR_KERNEL_RATIO", default_value_t = 0.05)]
    pub contour_kernel_ratio: f32,

    #[arg(long, env = "BLANK_INK_RATIO", default_value_t = 0.002)]
    pub blank_ink_ratio: f32,

    #[arg(long, env = "LINE_SOURCE", value_enum, default_value_t = LineSource::Page)]
    pub line_source: LineSource,

    #[arg(long, env = "MIN_LINE_PIXEL_HEIGHT_FOR_MODEL", default_value_t = DEFAULT_MIN_LINE_PIXEL_HEIGHT)]
    pub min_line_pixel_height_for_model: u32,

    /// Maximum concurrent recognizer calls per page
    #[arg(long, env = "RECOGNITION_WORKERS", default_value_t = 1)]
    pub recognition_workers: usize,

    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,
}

impl PipelineArgs {
    pub fn to_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_image_width: self.max_image_width,
            threshold_method: self.threshold_method,
            adaptive_threshold_window: self.adaptive_threshold_window,
            adaptive_threshold_constant: self.adaptive_threshold_constant,
            binary_input: self.binary_input,
            denoise: self.denoise,
            denoise_radius: self.denoise_radius,
            segmentation_strategy: self.segmentation_strategy,
            profile_threshold: self.profile_threshold,
            min_line_height: self.min_line_height,
            contour_kernel_ratio: self.contour_kernel_ratio,
            blank_ink_ratio: self.blank_ink_ratio,
            line_source: self.line_source,
            min_line_pixel_height_for_model: self.min_line_pixel_height_for_model,
            recognition_workers: self.recognition_workers,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

/// HTTP listener
#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[arg(long, env = "API_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "API_PORT", default_value_t = 5001)]
    pub port: u16,

    /// Whole-page deadline in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,
}

impl ServerArgs {
    pub fn to_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

/// Load the recognizer; several instances are pooled round-robin
pub async fn load_recognizer(args: &ModelArgs) -> Result<Arc<dyn LineRecognizer>> {
    let instances = args.recognizer_instances.max(1);

    let mut members: Vec<Arc<dyn LineRecognizer>> = Vec::with_capacity(instances);
    for i in 0..instances {
        let recognizer = OnnxLineRecognizer::new(&args.model_path, &args.dict_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to load recognizer {} of {} from {}",
                    i + 1,
                    instances,
                    args.model_path.display()
                )
            })?;
        members.push(Arc::new(recognizer));
    }

    if members.len() == 1 {
        return Ok(members.remove(0));
    }

    info!("Pooling {} recognizer instances", members.len());
    let pool = RecognizerPool::new(members).context("Failed to build recognizer pool")?;
    Ok(Arc::new(pool))
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.pipeline.to_config();
    config
        .validate()
        .context("Invalid pipeline configuration")?;

    let recognizer = load_recognizer(&cli.model).await?;
    let pipeline = Arc::new(HandwritingPipeline::new(config, recognizer)?);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => start_server(&cli.server.to_config(), pipeline).await,
        Commands::Transcribe(args) => transcribe::run(args, &pipeline).await,
    }
}
