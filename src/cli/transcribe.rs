// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::vision::HandwritingPipeline;

/// Arguments for the transcribe command
#[derive(Args, Debug)]
pub struct TranscribeArgs {
    /// Page image (PNG, JPEG, WebP, GIF, BMP or TIFF)
    pub image: PathBuf,

    /// Print the full transcript as JSON instead of plain text
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: TranscribeArgs, pipeline: &HandwritingPipeline) -> Result<()> {
    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("Failed to read {}", args.image.display()))?;

    let (transcript, info) = pipeline
        .transcribe_bytes(&bytes, &CancellationToken::new())
        .await?;

    info!(
        "Transcribed {} ({}x{}): {} lines, {} failed",
        args.image.display(),
        info.width,
        info.height,
        transcript.lines.len(),
        transcript.failed_lines()
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&transcript)?);
    } else {
        println!("{}", transcript.text);
    }

    Ok(())
}
