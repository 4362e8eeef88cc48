//! Source client configuration.

use std::time::Duration;

use minicast_core::{source_url, EndpointError};
use url::Url;

/// Relay endpoint used when none is given.
pub const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:8000/ws";

/// Bytes per binary message.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// All runtime configuration for one streaming run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Full source URL, already carrying `source=true`.
    pub url: Url,

    /// Maximum bytes per binary message.
    pub chunk_size: usize,

    /// Target throughput in bytes per second; `0` sends as fast as the relay
    /// accepts.
    pub rate: u64,

    /// How long to wait for the relay to answer our close frame.
    pub close_timeout: Duration,
}

impl SourceConfig {
    /// Builds a config for `endpoint` with default chunking and no pacing.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError`] if `endpoint` is not a `ws://` or `wss://`
    /// URL.
    pub fn new(endpoint: &str) -> Result<Self, EndpointError> {
        Ok(Self {
            url: source_url(endpoint)?,
            chunk_size: DEFAULT_CHUNK_SIZE,
            rate: 0,
            close_timeout: Duration::from_secs(2),
        })
    }
}
