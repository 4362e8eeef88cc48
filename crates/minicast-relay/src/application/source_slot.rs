//! The Source Slot: at most one active source, first come first served.
//!
//! ```text
//! S1 try_acquire ──► slot empty   ──► S1 stored, Ok
//! S2 try_acquire ──► slot holds S1 ──► S2 gets the busy message, closed, Err
//! S1 release     ──► slot holds S1 ──► cleared
//! S1 release     ──► slot holds S3 ──► no-op (stale release)
//! ```

use minicast_core::SOURCE_BUSY_MESSAGE;
use tokio::sync::Mutex;
use tracing::debug;

use super::connection::{ConnectionHandle, ConnectionId};
use super::error::RelayError;

#[derive(Default)]
pub struct SourceSlot {
    active: Mutex<Option<ConnectionHandle>>,
}

impl SourceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `conn` the active source if the slot is empty.
    ///
    /// The check and the store happen under one lock acquisition.  A losing
    /// connection is sent [`SOURCE_BUSY_MESSAGE`] and closed; it is never
    /// queued.
    ///
    /// # Errors
    ///
    /// [`RelayError::SourceBusy`] naming the source that holds the slot.
    pub async fn try_acquire(&self, conn: &ConnectionHandle) -> Result<(), RelayError> {
        let active = {
            let mut slot = self.active.lock().await;
            match slot.as_ref() {
                Some(active) => active.id(),
                None => {
                    *slot = Some(conn.clone());
                    return Ok(());
                }
            }
        };

        if let Err(e) = conn.send_text(SOURCE_BUSY_MESSAGE) {
            debug!(conn = %conn.id(), "could not queue busy message: {e}");
        }
        conn.close();
        Err(RelayError::SourceBusy { active })
    }

    /// Clears the slot if and only if it holds `conn`.
    ///
    /// Returns `true` when the slot was cleared.  A release from a connection
    /// that has already been replaced leaves the newer source in place.
    pub async fn release(&self, conn: &ConnectionHandle) -> bool {
        let mut slot = self.active.lock().await;
        match slot.as_ref() {
            Some(active) if active.id() == conn.id() => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Id of the active source, if any.
    pub async fn current(&self) -> Option<ConnectionId> {
        self.active.lock().await.as_ref().map(ConnectionHandle::id)
    }

    /// Empties the slot, returning whatever it held.
    pub async fn take(&self) -> Option<ConnectionHandle> {
        self.active.lock().await.take()
    }
}
