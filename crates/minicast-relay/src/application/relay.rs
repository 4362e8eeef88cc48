//! The relay facade: the only shared state sessions talk to.
//!
//! [`Relay`] owns the Listener Registry, the Source Slot, and the
//! Broadcaster, and exposes the handful of operations a session needs.  It is
//! created once per server and shared across session tasks behind an `Arc`.
//!
//! ```text
//! source session ──submit()──► [frame channel] ──► Broadcaster task
//!                                                     │
//! listener session ──attach_listener()──► Registry ◄──┘ snapshot + try_send
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use minicast_core::{AudioFrame, Role};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::broadcaster::{Broadcaster, FanoutCounters};
use super::connection::{ConnectionHandle, ConnectionId, ConnectionIo};
use super::error::RelayError;
use super::listeners::ListenerRegistry;
use super::source_slot::SourceSlot;
use crate::domain::RelayConfig;

/// Outbound queue size for source connections.  Sources are only ever sent
/// the busy message, so a handful of slots is plenty.
const SOURCE_CONTROL_QUEUE: usize = 4;

/// Point-in-time view of the relay, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub listeners: usize,
    pub source: Option<ConnectionId>,
    pub history_bytes: usize,
    pub fanout: FanoutCounters,
}

pub struct Relay {
    listeners: Arc<ListenerRegistry>,
    source: SourceSlot,
    broadcaster: Arc<Broadcaster>,
    frames: mpsc::Sender<AudioFrame>,
    listener_queue_capacity: usize,
    shut_down: AtomicBool,
}

impl Relay {
    /// Builds the relay and spawns its broadcaster task on the current Tokio
    /// runtime.  The task ends when the relay is dropped.
    pub fn start(config: &RelayConfig) -> Arc<Self> {
        let listeners = Arc::new(ListenerRegistry::new());
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&listeners),
            config.history_limit,
        ));
        let (frames, frames_rx) = mpsc::channel(config.source_queue_capacity);

        tokio::spawn(Arc::clone(&broadcaster).run(frames_rx));

        Arc::new(Self {
            listeners,
            source: SourceSlot::new(),
            broadcaster,
            frames,
            listener_queue_capacity: config.listener_queue_capacity,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Creates the handle for a freshly classified connection.
    pub fn open_connection(&self, role: Role, peer: SocketAddr) -> (ConnectionHandle, ConnectionIo) {
        let capacity = match role {
            Role::Source => SOURCE_CONTROL_QUEUE,
            Role::Listener => self.listener_queue_capacity,
        };
        ConnectionHandle::new(role, peer, capacity)
    }

    /// Tries to make `conn` the active source.
    ///
    /// # Errors
    ///
    /// [`RelayError::SourceBusy`] if another source is active (`conn` has
    /// then been sent the busy message and closed), or
    /// [`RelayError::ShuttingDown`] after [`shutdown`](Self::shutdown).
    pub async fn admit_source(&self, conn: &ConnectionHandle) -> Result<(), RelayError> {
        if self.is_shut_down() {
            conn.close();
            return Err(RelayError::ShuttingDown);
        }

        self.source.try_acquire(conn).await?;

        // Shutdown may have drained the slot between the check and the acquire.
        if self.is_shut_down() {
            self.source.release(conn).await;
            conn.close();
            return Err(RelayError::ShuttingDown);
        }
        Ok(())
    }

    /// Tears down a source session: releases the slot if `conn` still holds
    /// it and closes the connection.  Returns whether the slot was released.
    pub async fn release_source(&self, conn: &ConnectionHandle) -> bool {
        let released = self.source.release(conn).await;
        conn.close();
        released
    }

    /// Hands one frame from the active source to the broadcaster, waiting if
    /// the frame channel is full.
    ///
    /// # Errors
    ///
    /// [`RelayError::ShuttingDown`] if the broadcaster is gone.
    pub async fn submit(&self, frame: AudioFrame) -> Result<(), RelayError> {
        self.frames
            .send(frame)
            .await
            .map_err(|_| RelayError::ShuttingDown)
    }

    /// Seeds and registers a listener.  Returns how many history frames it
    /// was seeded with.
    ///
    /// # Errors
    ///
    /// [`RelayError::ShuttingDown`] after [`shutdown`](Self::shutdown); the
    /// connection is closed and left unregistered.
    pub async fn attach_listener(&self, conn: ConnectionHandle) -> Result<usize, RelayError> {
        if self.is_shut_down() {
            conn.close();
            return Err(RelayError::ShuttingDown);
        }

        let id = conn.id();
        let seeded = self.broadcaster.attach(conn.clone()).await;

        // Same race as in `admit_source`: never leave a listener behind a drain.
        if self.is_shut_down() {
            self.listeners.unregister(id).await;
            conn.close();
            return Err(RelayError::ShuttingDown);
        }
        Ok(seeded)
    }

    /// Tears down a listener session: unregisters it (if a failed broadcast
    /// has not already) and closes the connection.
    pub async fn detach_listener(&self, conn: &ConnectionHandle) {
        self.listeners.unregister(conn.id()).await;
        conn.close();
    }

    pub async fn active_source(&self) -> Option<ConnectionId> {
        self.source.current().await
    }

    pub async fn has_listener(&self, id: ConnectionId) -> bool {
        self.listeners.contains(id).await
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.len().await
    }

    pub async fn stats(&self) -> RelayStats {
        RelayStats {
            listeners: self.listeners.len().await,
            source: self.source.current().await,
            history_bytes: self.broadcaster.history_bytes().await,
            fanout: self.broadcaster.counters(),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Closes the active source and every listener and empties both
    /// collections.  Only the first call does anything.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("relay already shut down");
            return;
        }

        let source = self.source.take().await;
        if let Some(conn) = &source {
            conn.close();
        }

        let listeners = self.listeners.drain().await;
        for conn in &listeners {
            conn.close();
        }

        self.broadcaster.clear_history().await;

        info!(
            source = source.is_some(),
            listeners = listeners.len(),
            "relay shut down; all connections closed"
        );
    }
}
