//! # minicast-core
//!
//! Shared library for the minicast audio relay containing the connection
//! roles, the opaque audio frame type, the rolling history buffer, and the
//! small control protocol spoken between the relay and its peers.
//!
//! This crate is used by both the relay server and the reference source
//! client.  It has no dependencies on sockets or async runtimes.
//!
//! # Architecture overview
//!
//! minicast relays one live audio stream from a single producer (the
//! "source") to any number of consumers ("listeners") over WebSocket.  The
//! relay never looks inside the audio: every binary message from the source
//! is forwarded verbatim.
//!
//! - **`domain`** – Pure value types: [`Role`], [`AudioFrame`], and the
//!   [`RollingBuffer`] used to seed late joiners with recent audio.
//!
//! - **`protocol`** – The out-of-band role indicator (`?source=true`), the
//!   one text control message the relay ever sends, and a helper that turns
//!   a relay endpoint into a source URL.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `minicast_core::AudioFrame` instead of `minicast_core::domain::frame::AudioFrame`.
pub use domain::frame::AudioFrame;
pub use domain::history::RollingBuffer;
pub use domain::role::Role;
pub use protocol::control::{
    source_url, EndpointError, DEFAULT_RELAY_PATH, SOURCE_BUSY_MESSAGE, SOURCE_QUERY_KEY,
};
