//! The Listener Registry: the set of connections receiving the stream.
//!
//! A listener is in the registry exactly while its session is running and has
//! not failed.  Two paths can remove it: its own read loop ending, and the
//! broadcaster evicting it after a failed send.  Both may race, so removal is
//! idempotent.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use super::connection::{ConnectionHandle, ConnectionId};

/// Lock-guarded set of listener connections.
///
/// Broadcasting only needs a consistent list of targets, so it takes a
/// [`snapshot`](Self::snapshot) under the read lock and sends without holding
/// any lock at all.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `conn`.  Each accepted connection has a fresh id, so there is no
    /// duplicate check.
    pub async fn register(&self, conn: ConnectionHandle) {
        let mut listeners = self.listeners.write().await;
        debug!(conn = %conn.id(), peer = %conn.peer(), "listener registered");
        listeners.insert(conn.id(), conn);
    }

    /// Removes the listener with `id`, returning it if it was present.
    ///
    /// Removing an absent listener is a no-op.
    pub async fn unregister(&self, id: ConnectionId) -> Option<ConnectionHandle> {
        let removed = self.listeners.write().await.remove(&id);
        if removed.is_some() {
            debug!(conn = %id, "listener unregistered");
        }
        removed
    }

    /// Clones the current set of handles.  The read lock is released before
    /// this returns.
    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.listeners.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.listeners.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.listeners.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.listeners.read().await.is_empty()
    }

    /// Removes and returns every listener.
    pub async fn drain(&self) -> Vec<ConnectionHandle> {
        self.listeners
            .write()
            .await
            .drain()
            .map(|(_, conn)| conn)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::connection::test_peer;
    use minicast_core::Role;

    fn listener() -> ConnectionHandle {
        ConnectionHandle::new(Role::Listener, test_peer(), 8).0
    }

    #[tokio::test]
    async fn test_register_then_contains() {
        let registry = ListenerRegistry::new();
        let conn = listener();

        registry.register(conn.clone()).await;

        assert!(registry.contains(conn.id()).await);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_returns_removed_handle() {
        let registry = ListenerRegistry::new();
        let conn = listener();
        registry.register(conn.clone()).await;

        let removed = registry.unregister(conn.id()).await;

        assert_eq!(removed, Some(conn));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister_twice_is_same_as_once() {
        // Arrange: two listeners, one of which is removed by two racing paths
        let registry = ListenerRegistry::new();
        let a = listener();
        let b = listener();
        registry.register(a.clone()).await;
        registry.register(b.clone()).await;

        // Act
        let first = registry.unregister(a.id()).await;
        let second = registry.unregister(a.id()).await;

        // Assert
        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(b.id()).await);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_later_changes() {
        let registry = ListenerRegistry::new();
        let a = listener();
        registry.register(a.clone()).await;

        let snapshot = registry.snapshot().await;
        registry.unregister(a.id()).await;

        assert_eq!(snapshot, vec![a]);
        assert!(registry.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_drain_empties_registry() {
        let registry = ListenerRegistry::new();
        for _ in 0..3 {
            registry.register(listener()).await;
        }

        let drained = registry.drain().await;

        assert_eq!(drained.len(), 3);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_register_and_unregister() {
        let registry = std::sync::Arc::new(ListenerRegistry::new());
        let conns: Vec<_> = (0..64).map(|_| listener()).collect();

        let mut tasks = Vec::new();
        for conn in conns.clone() {
            let registry = std::sync::Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                registry.register(conn.clone()).await;
                registry.unregister(conn.id()).await;
                registry.unregister(conn.id()).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert!(registry.is_empty().await);
    }
}
