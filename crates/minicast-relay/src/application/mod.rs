//! Application layer for minicast-relay.
//!
//! The application layer owns the relay's shared state and its rules: who
//! may be the source, who is listening, and how a frame reaches every
//! listener.  It knows nothing about sockets or WebSocket framing; sessions in
//! the infrastructure layer talk to it through [`ConnectionHandle`]s.
//!
//! # Responsibilities
//!
//! - [`ListenerRegistry`]: the set of live listeners
//! - [`SourceSlot`]: at most one active source
//! - [`Broadcaster`]: failure-isolated fan-out plus late-joiner history
//! - [`Relay`]: the facade tying the three together, including shutdown

pub mod broadcaster;
pub mod connection;
pub mod error;
pub mod listeners;
pub mod relay;
pub mod source_slot;

pub use broadcaster::{BroadcastReport, Broadcaster, FanoutCounters};
pub use connection::{ConnectionHandle, ConnectionId, ConnectionIo, DeliveryError, Outbound};
pub use error::RelayError;
pub use listeners::ListenerRegistry;
pub use relay::{Relay, RelayStats};
pub use source_slot::SourceSlot;
