// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use handscript_node::cli::{execute, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("{}", handscript_node::version::get_version_string());

    // Parse CLI arguments (environment fallbacks included)
    let cli = Cli::parse();

    // Recognizer load failures are fatal
    match execute(cli).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!("Fatal: {:#}", e);
            std::process::exit(1);
        }
    }
}
