//! Domain layer for minicast-source: configuration and pacing, no I/O.

pub mod config;
pub mod pacing;

pub use config::{SourceConfig, DEFAULT_CHUNK_SIZE, DEFAULT_RELAY_URL};
pub use pacing::Pacer;
