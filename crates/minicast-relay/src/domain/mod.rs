//! Domain layer for minicast-relay.
//!
//! Pure configuration types with no I/O.  The frame, role, and history types
//! shared with clients live in `minicast-core`.

pub mod config;

pub use config::{InvalidConfig, RelayConfig};
