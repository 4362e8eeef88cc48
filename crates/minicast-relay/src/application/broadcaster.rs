//! The Broadcaster: fans each source frame out to every listener.
//!
//! # Isolation
//!
//! Each listener is offered the frame with a non-blocking `try_send` onto its
//! own bounded queue.  A listener whose queue is full or whose writer has
//! died is evicted on the spot (unregistered and closed) and the broadcast
//! carries on with the rest.  One slow or dead listener therefore never
//! delays anyone else, and never delays the source.
//!
//! # Ordering and late joiners
//!
//! Frames arrive through a single bounded channel and are broadcast one at a
//! time, so every listener sees them in source order.  The fan-out lock
//! serialises [`Broadcaster::broadcast`] against [`Broadcaster::attach`]: a
//! joining listener is seeded from the rolling history and registered in one
//! step, so it neither misses the next live frame nor receives a seeded frame
//! twice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use minicast_core::{AudioFrame, RollingBuffer};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use super::connection::{ConnectionHandle, DeliveryError};
use super::listeners::ListenerRegistry;

/// Outcome of one [`Broadcaster::broadcast`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Listeners the frame was queued for.
    pub delivered: usize,
    /// Listeners removed because the frame could not be queued.
    pub evicted: usize,
}

/// Running totals since the relay started.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutCounters {
    pub frames: u64,
    pub bytes: u64,
    pub evictions: u64,
}

pub struct Broadcaster {
    listeners: Arc<ListenerRegistry>,
    /// Fan-out lock.  Always taken before the registry lock.
    history: Mutex<RollingBuffer>,
    frames: AtomicU64,
    bytes: AtomicU64,
    evictions: AtomicU64,
}

impl Broadcaster {
    /// `history_limit` is the rolling buffer's byte ceiling; `0` disables
    /// seeding of late joiners.
    pub fn new(listeners: Arc<ListenerRegistry>, history_limit: usize) -> Self {
        Self {
            listeners,
            history: Mutex::new(RollingBuffer::new(history_limit)),
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Offers `frame` to every registered listener.
    pub async fn broadcast(&self, frame: AudioFrame) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut failed: Vec<(ConnectionHandle, DeliveryError)> = Vec::new();

        {
            let mut history = self.history.lock().await;
            history.push(&frame);
            self.frames.fetch_add(1, Ordering::Relaxed);
            self.bytes.fetch_add(frame.len() as u64, Ordering::Relaxed);

            for conn in self.listeners.snapshot().await {
                match conn.send_frame(frame.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => failed.push((conn, e)),
                }
            }
        }

        for (conn, reason) in failed {
            debug!(conn = %conn.id(), peer = %conn.peer(), "evicting listener: {reason}");
            self.listeners.unregister(conn.id()).await;
            conn.close();
            report.evicted += 1;
        }

        self.evictions
            .fetch_add(report.evicted as u64, Ordering::Relaxed);

        report
    }

    /// Seeds `conn` from the rolling history and registers it.
    ///
    /// At most half of the listener's free queue is used for history, newest
    /// frames kept, so a freshly seeded listener is not evicted by the very
    /// next live frame.  Returns the number of frames seeded.
    pub async fn attach(&self, conn: ConnectionHandle) -> usize {
        let history = self.history.lock().await;

        let frames = history.frames();
        let room = conn.queue_room() / 2;
        let start = frames.len().saturating_sub(room);

        let mut seeded = 0;
        for frame in &frames[start..] {
            if conn.send_frame(frame.clone()).is_err() {
                break;
            }
            seeded += 1;
        }

        self.listeners.register(conn).await;
        seeded
    }

    /// Consumes frames from the source side until every sender is dropped.
    pub async fn run(self: Arc<Self>, mut frames: mpsc::Receiver<AudioFrame>) {
        while let Some(frame) = frames.recv().await {
            let report = self.broadcast(frame).await;
            if report.evicted > 0 {
                info!(
                    evicted = report.evicted,
                    delivered = report.delivered,
                    "dropped lagging or disconnected listeners"
                );
            }
        }
        debug!("frame channel closed; broadcaster stopping");
    }

    /// Bytes currently held in the rolling history.
    pub async fn history_bytes(&self) -> usize {
        self.history.lock().await.len_bytes()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    pub fn counters(&self) -> FanoutCounters {
        FanoutCounters {
            frames: self.frames.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
