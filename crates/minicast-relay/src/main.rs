//! minicast relay: entry point.
//!
//! Accepts WebSocket connections on a single path.  A connection opened with
//! `?source=true` becomes the one live source (a second concurrent source is
//! turned away); every other connection is a listener and receives a copy of
//! each binary frame the source sends.
//!
//! # Usage
//!
//! ```text
//! minicast-relay [OPTIONS]
//!
//! Options:
//!   --port           <PORT>   Listening port [default: 8000]
//!   --bind           <IP>     Bind address [default: 0.0.0.0]
//!   --path           <PATH>   Upgrade path [default: /ws]
//!   --listener-queue <N>      Frames queued per listener before it is dropped [default: 1024]
//!   --source-queue   <N>      Frames buffered between source and fan-out [default: 64]
//!   --history-bytes  <BYTES>  Late-joiner history size, 0 disables [default: 1048576]
//!   --close-grace-ms <MS>     Time allowed to flush a close frame [default: 2000]
//!   --config         <FILE>   Optional TOML config file
//! ```
//!
//! # Configuration precedence
//!
//! Built-in defaults, then the `--config` file, then flags or environment
//! variables.  A flag only overrides the file when it is actually given.
//!
//! | Variable                  | Flag               |
//! |---------------------------|--------------------|
//! | `MINICAST_PORT`           | `--port`           |
//! | `MINICAST_BIND`           | `--bind`           |
//! | `MINICAST_PATH`           | `--path`           |
//! | `MINICAST_LISTENER_QUEUE` | `--listener-queue` |
//! | `MINICAST_SOURCE_QUEUE`   | `--source-queue`   |
//! | `MINICAST_HISTORY_BYTES`  | `--history-bytes`  |
//! | `MINICAST_CLOSE_GRACE_MS` | `--close-grace-ms` |
//! | `MINICAST_CONFIG`         | `--config`         |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use minicast_relay::domain::RelayConfig;
use minicast_relay::infrastructure::{load_config_file, run_server};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Single-source WebSocket audio relay.
///
/// Flags are optional so that an unset flag leaves the config file's value
/// (or the built-in default) alone.
#[derive(Debug, Default, Parser)]
#[command(
    name = "minicast-relay",
    about = "Relays one live audio source to many WebSocket listeners",
    version
)]
struct Cli {
    /// TCP port to listen on [default: 8000].
    #[arg(long, env = "MINICAST_PORT")]
    port: Option<u16>,

    /// IP address to bind to [default: 0.0.0.0].
    ///
    /// Use `127.0.0.1` to accept only local connections.
    #[arg(long, env = "MINICAST_BIND")]
    bind: Option<String>,

    /// The only path WebSocket upgrades are accepted on [default: /ws].
    #[arg(long, env = "MINICAST_PATH")]
    path: Option<String>,

    /// Frames a listener may have queued before it is dropped as too slow
    /// [default: 1024].
    #[arg(long, env = "MINICAST_LISTENER_QUEUE")]
    listener_queue: Option<usize>,

    /// Frames buffered between the source and the fan-out [default: 64].
    #[arg(long, env = "MINICAST_SOURCE_QUEUE")]
    source_queue: Option<usize>,

    /// Bytes of recent audio replayed to new listeners; 0 disables
    /// [default: 1048576].
    #[arg(long, env = "MINICAST_HISTORY_BYTES")]
    history_bytes: Option<usize>,

    /// Milliseconds a closing connection may spend flushing its close frame
    /// [default: 2000].
    #[arg(long, env = "MINICAST_CLOSE_GRACE_MS")]
    close_grace_ms: Option<u64>,

    /// TOML file with any of the settings above.
    #[arg(long, env = "MINICAST_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    /// Builds the [`RelayConfig`]: defaults, then the config file, then flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, if
    /// `--bind` is not an IP address, or if the result fails validation.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let mut config = RelayConfig::default();

        if let Some(path) = &self.config {
            load_config_file(path)
                .with_context(|| format!("failed to load config file '{}'", path.display()))?
                .apply_to(&mut config);
        }

        if let Some(bind) = &self.bind {
            let ip: IpAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
            config.bind_addr = SocketAddr::new(ip, config.bind_addr.port());
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(path) = self.path {
            config.path = path;
        }
        if let Some(n) = self.listener_queue {
            config.listener_queue_capacity = n;
        }
        if let Some(n) = self.source_queue {
            config.source_queue_capacity = n;
        }
        if let Some(n) = self.history_bytes {
            config.history_limit = n;
        }
        if let Some(ms) = self.close_grace_ms {
            config.close_grace = Duration::from_millis(ms);
        }

        config.validate().context("invalid relay configuration")?;
        Ok(config)
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

    let config = Cli::parse().into_relay_config()?;

    info!(
        bind = %config.bind_addr,
        path = %config.path,
        listener_queue = config.listener_queue_capacity,
        history_bytes = config.history_limit,
        "minicast relay starting"
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    // The accept loop polls this flag every 200 ms.
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("minicast relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
