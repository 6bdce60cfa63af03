//! # darshan-mounts - Burst-buffer usage from Darshan traces
//!
//! Scans a batch of Darshan I/O traces and counts, per file, the recorded mount
//! entries under a target mount point (DataWarp burst-buffer mounts by default).
//!
//! ## Features
//!
//! - **Parallel Scanning**: A fixed pool of workers decodes traces concurrently
//! - **Both Trace Formats**: Binary logs go through `darshan-parser`, `.txt.gz` dumps through `gunzip`
//! - **Streaming**: Decoder output is matched line by line, never held in memory
//! - **Configurable**: Target mount, pool size, timeouts and decoders via environment variables
//! - **Graceful Shutdown**: Ctrl-C stops running decoders and still reports every file
//!
//! ## Usage
//!
//! ```bash
//! darshan-mounts /global/darshanlogs/2017/1/4/*.darshan
//!
//! # Look for a different file system
//! DARSHAN_TARGET_MOUNT=/scratch2 DARSHAN_POOL_SIZE=16 darshan-mounts logs/*
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use darshan_mounts::commands::scan::ScanCommand;
use darshan_mounts::config::Config;

/// darshan-mounts - count target mount entries in Darshan traces
#[derive(Parser)]
#[command(
    name = "darshan-mounts",
    about = "Count target mount entries across a batch of Darshan traces",
    long_about = "Decodes each trace with darshan-parser (or gunzip for .txt.gz dumps) and reports \
                  how many of its mount entries fall under the target mount point. Configure with \
                  DARSHAN_TARGET_MOUNT, DARSHAN_POOL_SIZE, DARSHAN_JOB_TIMEOUT, DARSHAN_PARSER and \
                  DARSHAN_DECOMPRESSOR.",
    version
)]
struct Cli {
    /// Darshan trace files to scan
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "darshan_mounts=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    info!(
        "Matching mounts under {} with {} workers",
        config.target_mount_prefix, config.pool_size
    );

    // Ctrl-C cancels running decoders; remaining files are reported as cancelled
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupt received. Stopping decoders.");
            on_signal.cancel();
        }
    });

    match ScanCommand::new(cli.files, config).execute(cancel).await {
        Ok(report) => {
            report.print_summary();
            Ok(())
        }
        Err(e) => {
            error!("Scan failed: {}", e);
            std::process::exit(1);
        }
    }
}
