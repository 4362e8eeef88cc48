//! Connection handles: the relay's view of one live WebSocket.
//!
//! A [`ConnectionHandle`] is what the registry, the source slot, and the
//! broadcaster hold.  It never touches the socket directly.  Instead it owns
//! the sending half of a bounded outbound queue and a close signal:
//!
//! ```text
//! Broadcaster ──try_send──► [bounded queue] ──► writer task ──► WebSocket sink
//!                                  ▲
//! close() ──► close signal ────────┴──► writer sends Close, reader stops
//! ```
//!
//! Because every send is a non-blocking `try_send`, a stalled peer can only
//! fill its own queue; it can never stall the caller.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use minicast_core::{AudioFrame, Role};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

/// Opaque identity of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The first 8 hex digits are plenty to tell connections apart in logs.
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}

/// A message waiting in a connection's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Audio, sent as a WebSocket binary message.
    Frame(AudioFrame),
    /// A control notification, sent as a WebSocket text message.
    Text(String),
}

/// Why a message could not be queued for a connection.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The outbound queue is full: the peer is not keeping up.
    #[error("outbound queue full (peer is lagging)")]
    Lagging,

    /// The connection is closed or its writer has gone away.
    #[error("connection closed")]
    Disconnected,
}

/// The receiving ends owned by a connection's writer task.
pub struct ConnectionIo {
    pub outbound: mpsc::Receiver<Outbound>,
}

struct Inner {
    id: ConnectionId,
    role: Role,
    peer: SocketAddr,
    outbound: mpsc::Sender<Outbound>,
    closed: watch::Sender<bool>,
}

/// Cheaply clonable handle to a live connection.
///
/// All clones refer to the same connection; equality is by [`ConnectionId`].
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<Inner>,
}

impl ConnectionHandle {
    /// Creates a handle with an outbound queue of `capacity` messages and
    /// returns it together with the writer's end of that queue.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.  [`RelayConfig::validate`] rejects zero
    /// capacities before any connection is opened.
    ///
    /// [`RelayConfig::validate`]: crate::domain::RelayConfig::validate
    pub fn new(role: Role, peer: SocketAddr, capacity: usize) -> (Self, ConnectionIo) {
        let (outbound, rx) = mpsc::channel(capacity);
        let (closed, _) = watch::channel(false);

        let handle = Self {
            inner: Arc::new(Inner {
                id: ConnectionId::new(),
                role,
                peer,
                outbound,
                closed,
            }),
        };
        (handle, ConnectionIo { outbound: rx })
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn role(&self) -> Role {
        self.inner.role
    }

    pub fn peer(&self) -> SocketAddr {
        self.inner.peer
    }

    /// Queues `msg` without waiting.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::Lagging`] when the queue is full and
    /// [`DeliveryError::Disconnected`] when the connection has been closed.
    pub fn try_send(&self, msg: Outbound) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Disconnected);
        }
        self.inner.outbound.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Disconnected,
        })
    }

    pub fn send_frame(&self, frame: AudioFrame) -> Result<(), DeliveryError> {
        self.try_send(Outbound::Frame(frame))
    }

    pub fn send_text(&self, text: impl Into<String>) -> Result<(), DeliveryError> {
        self.try_send(Outbound::Text(text.into()))
    }

    /// Free slots currently left in the outbound queue.
    pub fn queue_room(&self) -> usize {
        self.inner.outbound.capacity()
    }

    /// Signals the writer and reader of this connection to shut down.
    ///
    /// Idempotent.  Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.inner.closed.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Resolves once [`close`](Self::close) has been called on any clone.
    pub async fn closed(&self) {
        let mut rx = self.inner.closed.subscribe();
        // The sender lives in `self`, so `wait_for` can only end by seeing `true`.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ConnectionHandle {}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id())
            .field("role", &self.role())
            .field("peer", &self.peer())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_peer() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40000))
}
