//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from defaults, an optional TOML file, and CLI
//! flags (see `main.rs` and [`crate::infrastructure::config_file`]), then
//! shared read-only.
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! reads in here) makes the relay easy to embed in tests.

use std::net::SocketAddr;
use std::time::Duration;

use minicast_core::domain::history::DEFAULT_HISTORY_LIMIT;
use minicast_core::DEFAULT_RELAY_PATH;
use thiserror::Error;

/// A configuration value the relay cannot run with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidConfig {
    #[error("listener queue capacity must be at least 1")]
    ZeroListenerQueue,

    #[error("source queue capacity must be at least 1")]
    ZeroSourceQueue,

    #[error("upgrade path must start with '/', got '{0}'")]
    BadPath(String),
}

/// All runtime configuration for the relay.
///
/// ```rust
/// use minicast_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8000);
/// assert_eq!(cfg.path, "/ws");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address and port the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// The single path upgrades are accepted on.  Requests for any other
    /// path are refused during the handshake.
    pub path: String,

    /// Frames a listener may have queued before it counts as lagging and is
    /// dropped.
    pub listener_queue_capacity: usize,

    /// Frames buffered between the source's read loop and the broadcaster.
    /// When full, reading from the source pauses.
    pub source_queue_capacity: usize,

    /// Byte ceiling of the late-joiner history; `0` disables it.
    pub history_limit: usize,

    /// How long a closing connection may spend flushing its control
    /// messages and close frame.
    pub close_grace: Duration,
}

impl Default for RelayConfig {
    /// | Field                   | Default        |
    /// |-------------------------|----------------|
    /// | bind_addr               | `0.0.0.0:8000` |
    /// | path                    | `/ws`          |
    /// | listener_queue_capacity | 1024           |
    /// | source_queue_capacity   | 64             |
    /// | history_limit           | 1 MiB          |
    /// | close_grace             | 2 seconds      |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            path: DEFAULT_RELAY_PATH.to_string(),
            listener_queue_capacity: 1024,
            source_queue_capacity: 64,
            history_limit: DEFAULT_HISTORY_LIMIT,
            close_grace: Duration::from_secs(2),
        }
    }
}

impl RelayConfig {
    /// Checks the values that would otherwise panic or misroute at runtime.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvalidConfig`] found.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.listener_queue_capacity == 0 {
            return Err(InvalidConfig::ZeroListenerQueue);
        }
        if self.source_queue_capacity == 0 {
            return Err(InvalidConfig::ZeroSourceQueue);
        }
        if !self.path.starts_with('/') {
            return Err(InvalidConfig::BadPath(self.path.clone()));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
