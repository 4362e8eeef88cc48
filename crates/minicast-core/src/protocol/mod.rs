//! The relay's wire-level conventions.
//!
//! minicast defines almost no application protocol of its own: audio travels
//! as WebSocket binary messages, verbatim.  What remains is the role flag on
//! the upgrade request and the single text control message.

pub mod control;

pub use control::{source_url, EndpointError, DEFAULT_RELAY_PATH, SOURCE_BUSY_MESSAGE, SOURCE_QUERY_KEY};
