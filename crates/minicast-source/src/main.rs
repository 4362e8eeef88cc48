//! minicast source: entry point.
//!
//! Streams a file (or stdin) to a minicast relay as its single live source.
//!
//! # Usage
//!
//! ```text
//! minicast-source [OPTIONS]
//!
//! Options:
//!   --url        <URL>    Relay endpoint [default: ws://127.0.0.1:8000/ws]
//!   --file       <FILE>   Input file; stdin when absent
//!   --chunk-size <BYTES>  Bytes per binary message [default: 4096]
//!   --rate       <BPS>    Pace to this many bytes per second, 0 = unpaced [default: 0]
//! ```
//!
//! For example, to stream a 128 kbit/s MP3 at real time:
//!
//! ```text
//! minicast-source --file show.mp3 --rate 16000
//! ```
//!
//! Exits non-zero if the relay cannot be reached or already has a source.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncRead;
use tracing::info;
use tracing_subscriber::EnvFilter;

use minicast_source::domain::{SourceConfig, DEFAULT_CHUNK_SIZE, DEFAULT_RELAY_URL};
use minicast_source::infrastructure::stream_to_relay;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Reference source client for the minicast relay.
#[derive(Debug, Parser)]
#[command(
    name = "minicast-source",
    about = "Streams a file or stdin to a minicast relay as its live source",
    version
)]
struct Cli {
    /// Relay endpoint.  `source=true` is added automatically.
    #[arg(long, default_value = DEFAULT_RELAY_URL, env = "MINICAST_URL")]
    url: String,

    /// File to stream.  Reads stdin when absent.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Bytes per binary message.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Target rate in bytes per second; 0 sends as fast as possible.
    #[arg(long, default_value_t = 0)]
    rate: u64,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`SourceConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--url` is not a ws/wss URL or `--chunk-size` is 0.
    fn into_source_config(self) -> anyhow::Result<SourceConfig> {
        anyhow::ensure!(self.chunk_size > 0, "--chunk-size must be at least 1");

        let mut config = SourceConfig::new(&self.url)
            .with_context(|| format!("invalid relay URL: '{}'", self.url))?;
        config.chunk_size = self.chunk_size;
        config.rate = self.rate;
        Ok(config)
    }
}

async fn open_input(file: Option<&PathBuf>) -> anyhow::Result<Box<dyn AsyncRead + Unpin + Send>> {
    match file {
        Some(path) => {
            let f = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open '{}'", path.display()))?;
            Ok(Box::new(f))
        }
        None => Ok(Box::new(tokio::io::stdin())),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let file = cli.file.clone();
    let config = cli.into_source_config()?;
    let input = open_input(file.as_ref()).await?;

    info!(
        url = %config.url,
        input = %file.as_ref().map_or_else(|| "stdin".to_string(), |p| p.display().to_string()),
        rate = config.rate,
        "minicast source starting"
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; stopping stream");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    let summary = stream_to_relay(&config, input, running).await?;

    info!(
        frames = summary.frames,
        bytes = summary.bytes,
        "minicast source stopped"
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
