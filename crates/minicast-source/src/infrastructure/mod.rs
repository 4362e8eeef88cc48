//! Infrastructure layer for minicast-source: the WebSocket connection to the
//! relay and the read/send loop.

pub mod streamer;

pub use streamer::{stream_to_relay, SourceError, StreamSummary};
