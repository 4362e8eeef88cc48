//! minicast-source library crate.
//!
//! A reference source for the minicast relay: it connects with
//! `?source=true` and sends its input as a sequence of binary messages.  The
//! bytes are never inspected, so any pre-encoded stream (MP3, Opus in Ogg,
//! raw PCM) works as long as the listeners can play it.
//!
//! # Architecture
//!
//! ```text
//! file / stdin
//!       ↓
//! [minicast-source]
//!   ├── domain/           SourceConfig, byte-rate Pacer (no I/O)
//!   └── infrastructure/
//!         └── streamer/   connect, chunk, pace, watch for rejection
//!       ↓
//! minicast-relay  (ws://host:8000/ws?source=true)
//! ```

/// Domain layer: configuration and pacing.
pub mod domain;

/// Infrastructure layer: the relay connection.
pub mod infrastructure;
