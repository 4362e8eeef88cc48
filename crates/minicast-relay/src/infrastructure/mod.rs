//! Infrastructure layer for minicast-relay.
//!
//! The infrastructure layer handles all I/O: the TCP listener, the WebSocket
//! upgrade, per-connection reader and writer tasks, and the optional config
//! file.
//!
//! # What does NOT belong here?
//!
//! - Who may be the source and how frames fan out (application layer)
//! - Configuration types and validation (domain layer)
//! - Command-line parsing (`main.rs`)

pub mod config_file;
mod session;
pub mod ws_server;

pub use config_file::{load_config_file, ConfigError, FileConfig};
pub use ws_server::{run_server, RelayServer};
