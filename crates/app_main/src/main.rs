//! Glimpse - keyboard-driven photo culling
//!
//! Headless entry point: opens the folder given on the command line and
//! reads commands from stdin.

mod app;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Keyboard-driven photo culling.", long_about = None)]
struct Args {
    /// Folder to open on startup
    folder: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging and panic hook first
    app_log::init()?;

    // Clean up old logs (7 days)
    if let Err(e) = app_log::cleanup_old_logs(7) {
        tracing::warn!("Failed to cleanup old logs: {}", e);
    }

    tracing::info!("Glimpse starting...");

    // Load configuration
    let config = match &args.config {
        Some(path) => app_core::AppConfig::load_from(path)?,
        None => app_core::AppConfig::load().unwrap_or_default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(app::run(config, args.folder))
}
