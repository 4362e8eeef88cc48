//! minicast-relay library crate.
//!
//! A single-source WebSocket audio relay: one source pushes binary frames,
//! any number of listeners receive copies of them.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Source (binary frames over WebSocket, ?source=true)
//!         ↓
//! [minicast-relay]
//!   ├── domain/           RelayConfig and its validation
//!   ├── application/      Source Slot, Listener Registry, Broadcaster, Relay
//!   └── infrastructure/
//!         ├── ws_server/  Accept loop (tokio + tokio-tungstenite)
//!         ├── session/    Handshake, role classification, read/write loops
//!         └── config_file/ Optional TOML config
//!         ↓
//! Listeners (binary frames over WebSocket)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain`, `minicast-core`, and tokio's sync
//!   primitives only; it never touches a socket.
//! - `infrastructure` depends on everything else plus `tokio-tungstenite`.

/// Domain layer: configuration types (no I/O).
pub mod domain;

/// Application layer: relay state and fan-out rules.
pub mod application;

/// Infrastructure layer: WebSocket server, sessions, config file.
pub mod infrastructure;
