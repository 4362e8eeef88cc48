//! Optional TOML configuration file for the relay.
//!
//! Every key is optional; an absent key keeps whatever the layer below set
//! (the built-in defaults).  Unknown keys are an error so typos do not go
//! unnoticed.
//!
//! ```toml
//! bind = "127.0.0.1"
//! port = 9000
//! path = "/radio"
//! listener_queue = 512
//! source_queue = 32
//! history_bytes = 0
//! close_grace_ms = 500
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::RelayConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── File schema ───────────────────────────────────────────────────────────────

/// Contents of a relay config file.  `None` means "not set here".
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub listener_queue: Option<usize>,
    pub source_queue: Option<usize>,
    pub history_bytes: Option<usize>,
    pub close_grace_ms: Option<u64>,
}

impl FileConfig {
    /// Parses a config file's text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML, wrong value types, or
    /// unknown keys.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Overwrites the fields of `config` that this file sets.
    pub fn apply_to(&self, config: &mut RelayConfig) {
        let ip = self.bind.unwrap_or_else(|| config.bind_addr.ip());
        let port = self.port.unwrap_or_else(|| config.bind_addr.port());
        config.bind_addr = SocketAddr::new(ip, port);

        if let Some(path) = &self.path {
            config.path = path.clone();
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
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Reads and parses the config file at `path`.
///
/// Unlike a well-known default location, a file named explicitly on the
/// command line must exist.
///
/// # Errors
///
/// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`] if
/// its content is not a valid relay config.
pub fn load_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FileConfig::parse(&content)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
