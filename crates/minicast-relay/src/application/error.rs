//! Application-level failures of the relay.
//!
//! These are business-rule outcomes, not I/O errors.  I/O errors never leave
//! the session that hit them: they end that connection and nothing else.

use thiserror::Error;

use super::connection::ConnectionId;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RelayError {
    /// A second source tried to connect while one is active.
    #[error("another source is already connected ({active})")]
    SourceBusy { active: ConnectionId },

    /// The relay has been shut down and admits no new connections.
    #[error("relay is shutting down")]
    ShuttingDown,
}
