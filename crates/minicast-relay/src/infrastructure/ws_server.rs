//! WebSocket server: accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Accepting incoming TCP connections and spawning one session task per
//!    connection (see [`super::session`]).
//! 3. Stopping when the `running` flag is cleared, then shutting the relay
//!    down so every source and listener receives a close frame.
//!
//! # Scalability
//!
//! The accept loop never blocks on a session: it spawns the session task and
//! goes straight back to `accept()`.  Sessions are tracked in a `JoinSet` so
//! shutdown can wait for their close frames to go out.
//!
//! # Portability
//!
//! Uses only `tokio::net` APIs.  Shutdown is triggered by a shared
//! `AtomicBool` set by the Ctrl+C handler in `main.rs`.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::application::Relay;
use crate::domain::RelayConfig;
use crate::infrastructure::session::handle_session;

/// How often the accept loop wakes up to look at the `running` flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Slack on top of the close grace period before lingering sessions are
/// aborted at shutdown.
const SHUTDOWN_SLACK: Duration = Duration::from_millis(500);

// ── Server ────────────────────────────────────────────────────────────────────

/// A bound relay server that has not started accepting yet.
///
/// Splitting bind from run lets callers learn the actual port (useful with
/// port 0) and reach the [`Relay`] before the loop starts.
pub struct RelayServer {
    listener: TcpListener,
    relay: Arc<Relay>,
    config: Arc<RelayConfig>,
}

impl RelayServer {
    /// Validates `config`, binds the listening socket, and starts the relay.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address cannot
    /// be bound (port in use, missing permission).
    pub async fn bind(config: RelayConfig) -> anyhow::Result<Self> {
        config
            .validate()
            .context("invalid relay configuration")?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .with_context(|| format!("failed to bind relay listener on {}", config.bind_addr))?;

        let relay = Relay::start(&config);

        Ok(Self {
            listener,
            relay,
            config: Arc::new(config),
        })
    }

    /// The address actually bound.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS cannot report the socket's address.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read relay listener address")
    }

    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    /// Accepts connections until `running` is set to `false`, then shuts the
    /// relay down and waits (bounded by the close grace period) for every
    /// session to finish.
    pub async fn run(self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        let Self {
            listener,
            relay,
            config,
        } = self;
        let mut sessions = JoinSet::new();

        loop {
            if !running.load(Ordering::Relaxed) {
                info!("shutdown flag set; stopping accept loop");
                break;
            }

            match timeout(ACCEPT_POLL, listener.accept()).await {
                Ok(Ok((stream, peer))) => {
                    debug!(%peer, "tcp connection accepted");
                    sessions.spawn(handle_session(
                        stream,
                        peer,
                        Arc::clone(&relay),
                        Arc::clone(&config),
                    ));
                }
                Ok(Err(e)) => {
                    // Transient (e.g. too many open files); keep serving.
                    error!("accept error: {e}");
                }
                Err(_) => {}
            }

            // Reap finished sessions so the set does not grow without bound.
            while sessions.try_join_next().is_some() {}
        }

        drop(listener);
        relay.shutdown().await;

        let remaining = sessions.len();
        let drain = async { while sessions.join_next().await.is_some() {} };
        if timeout(config.close_grace + SHUTDOWN_SLACK, drain).await.is_err() {
            warn!(remaining, "sessions still running after close grace; aborting them");
            sessions.abort_all();
        }

        Ok(())
    }
}

/// Binds and runs the relay until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the listener cannot be
/// bound.
pub async fn run_server(config: RelayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let server = RelayServer::bind(config).await?;
    info!(
        "relay listening on ws://{}{}",
        server.local_addr()?,
        server.config.path
    );
    server.run(running).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
