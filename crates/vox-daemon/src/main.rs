//! voxd - resident streaming TTS daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use vox_core::logging::{self, LogFormat};
use vox_core::{default_daemon_log_file, DaemonConfig};
use vox_daemon::{DaemonContext, VoxServer};
use vox_engine::{MockEngine, SpeechEngine};

/// Resident streaming TTS daemon
#[derive(Debug, Parser)]
#[command(name = "voxd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Bind port (default: the well-known vox port)
    #[arg(long)]
    port: Option<u16>,

    /// Minutes of inactivity before self-shutdown
    #[arg(long)]
    idle_timeout_mins: Option<u64>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    /// Append logs to this file (default: voxd.log in the temp directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = DaemonConfig::default()
        .apply_env()
        .context("invalid environment configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(mins) = args.idle_timeout_mins {
        config.idle_timeout_mins = mins;
    }

    let log_file = args
        .log_file
        .or_else(|| config.logging.file.clone())
        .unwrap_or_else(default_daemon_log_file);
    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    logging::init_logging_with_file(&args.log_level, format, Some(&log_file));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        idle_timeout_mins = config.idle_timeout_mins,
        log_file = %log_file.display(),
        "starting voxd"
    );

    let engine: Arc<dyn SpeechEngine> = Arc::new(MockEngine::new());
    let ctx = Arc::new(DaemonContext::new(config, engine));

    VoxServer::new(ctx).run().await.context("server failed")?;

    info!("voxd shutdown complete");
    Ok(())
}
