//! Connection registry facade.
//!
//! [`ConnectionRegistry`] is the single entry point for connection
//! lifecycle and subscription management. It wraps a [`ConnectionStore`]
//! (in-memory or PostgreSQL) and owns the connection TTL policy: every
//! connect and touch stamps `expires_at = now + ttl`, and the expiry
//! sweep removes connections whose watermark has passed.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::store::ConnectionStore;
use crate::domain::{CardKey, ConnectionId, ConnectionRecord};
use crate::error::LexicastError;

/// Registry for live push connections and their card-key subscriptions.
///
/// Removal is cascading and idempotent: `disconnect`, `prune`, and the
/// expiry sweep all funnel into the store's conditional delete, so
/// concurrent removal paths (client close, failed push, TTL expiry)
/// cannot double-free or leave orphan subscriptions.
#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    store: Arc<dyn ConnectionStore>,
    ttl: chrono::Duration,
}

impl ConnectionRegistry {
    /// Creates a registry over the given store with a connection TTL in
    /// seconds.
    #[must_use]
    pub fn new(store: Arc<dyn ConnectionStore>, ttl_secs: u64) -> Self {
        Self {
            store,
            ttl: chrono::Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX)),
        }
    }

    /// Registers a new connection and returns its record.
    ///
    /// The connection ID is minted here (UUID v4) and the expiry
    /// watermark starts at `now + ttl`.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn connect(
        &self,
        user_id: Option<uuid::Uuid>,
    ) -> Result<ConnectionRecord, LexicastError> {
        let record = ConnectionRecord::new(ConnectionId::new(), user_id, self.ttl);
        self.store.insert_connection(record.clone()).await?;
        tracing::info!(conn_id = %record.conn_id, "connection registered");
        Ok(record)
    }

    /// Removes a connection and all of its subscriptions.
    ///
    /// Returns `true` if the connection existed. Safe to call multiple
    /// times for the same ID.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn disconnect(&self, conn_id: ConnectionId) -> Result<bool, LexicastError> {
        let removed = self.store.remove_connection(conn_id).await?;
        if removed {
            tracing::info!(conn_id = %conn_id, "connection removed");
        }
        Ok(removed)
    }

    /// Removes a connection whose push channel turned out to be gone.
    ///
    /// Same conditional delete as [`disconnect`](Self::disconnect); only
    /// the log line differs so sweep-vs-push removals can be told apart.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn prune(&self, conn_id: ConnectionId) -> Result<bool, LexicastError> {
        let removed = self.store.remove_connection(conn_id).await?;
        if removed {
            tracing::warn!(conn_id = %conn_id, "pruned gone connection");
        }
        Ok(removed)
    }

    /// Subscribes a connection to a card key.
    ///
    /// Duplicate subscriptions are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::ConnectionNotFound`] if the connection is
    /// not registered, or a [`LexicastError::PersistenceError`] if the
    /// store fails.
    pub async fn subscribe(
        &self,
        conn_id: ConnectionId,
        key: &CardKey,
    ) -> Result<(), LexicastError> {
        self.store.add_subscription(conn_id, key).await?;
        tracing::debug!(conn_id = %conn_id, key = %key, "subscribed");
        Ok(())
    }

    /// Removes one subscription edge. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn unsubscribe(
        &self,
        conn_id: ConnectionId,
        key: &CardKey,
    ) -> Result<bool, LexicastError> {
        let removed = self.store.remove_subscription(conn_id, key).await?;
        if removed {
            tracing::debug!(conn_id = %conn_id, key = %key, "unsubscribed");
        }
        Ok(removed)
    }

    /// Returns the connections currently subscribed to a key.
    ///
    /// Served from the store's `by_key` index, not a scan.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn subscribers_of(&self, key: &CardKey) -> Result<Vec<ConnectionId>, LexicastError> {
        self.store.connections_for_key(key).await
    }

    /// Returns the connections belonging to a user.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn connections_for_user(
        &self,
        user_id: uuid::Uuid,
    ) -> Result<Vec<ConnectionId>, LexicastError> {
        self.store.connections_for_user(user_id).await
    }

    /// Looks up a single connection record.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn get(
        &self,
        conn_id: ConnectionId,
    ) -> Result<Option<ConnectionRecord>, LexicastError> {
        self.store.get_connection(conn_id).await
    }

    /// Slides the connection's expiry watermark to `now + ttl`.
    ///
    /// Called on every inbound client frame. Unknown IDs are a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn touch(&self, conn_id: ConnectionId) -> Result<(), LexicastError> {
        self.store.touch(conn_id, Utc::now() + self.ttl).await
    }

    /// Removes every connection whose watermark is at or before `now`.
    ///
    /// Returns the IDs that were removed. A connection touched between
    /// the listing and the delete may still be removed; its client is
    /// expected to reconnect.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn expire_stale(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConnectionId>, LexicastError> {
        let stale = self.store.expired_connections(now).await?;
        let mut removed = Vec::with_capacity(stale.len());
        for conn_id in stale {
            if self.store.remove_connection(conn_id).await? {
                tracing::info!(conn_id = %conn_id, "expired stale connection");
                removed.push(conn_id);
            }
        }
        Ok(removed)
    }

    /// Number of live connections.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn connection_count(&self) -> Result<usize, LexicastError> {
        self.store.connection_count().await
    }

    /// Number of subscription edges.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] if the store fails.
    pub async fn subscription_count(&self) -> Result<usize, LexicastError> {
        self.store.subscription_count().await
    }
}

/// Spawns the periodic expiry sweep as a background task.
///
/// Runs [`ConnectionRegistry::expire_stale`] every `interval_secs`
/// seconds until the process exits. Store errors are logged and the
/// sweep continues on the next tick.
pub fn spawn_expiry_sweep(
    registry: ConnectionRegistry,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        // First tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match registry.expire_stale(Utc::now()).await {
                Ok(removed) if !removed.is_empty() => {
                    tracing::info!(count = removed.len(), "expiry sweep removed connections");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "expiry sweep failed");
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::registry::memory::InMemoryConnectionStore;

    fn make_registry() -> ConnectionRegistry {
        ConnectionRegistry::new(Arc::new(InMemoryConnectionStore::new()), 900)
    }

    fn make_key(term: &str) -> CardKey {
        let Ok(key) = CardKey::new("en", "es", "noun", term) else {
            panic!("valid key");
        };
        key
    }

    #[tokio::test]
    async fn connect_then_disconnect() {
        let registry = make_registry();
        let Ok(record) = registry.connect(None).await else {
            panic!("connect should succeed");
        };

        let Ok(count) = registry.connection_count().await else {
            panic!("count should not error");
        };
        assert_eq!(count, 1);

        let Ok(removed) = registry.disconnect(record.conn_id).await else {
            panic!("disconnect should not error");
        };
        assert!(removed);

        // Second disconnect for the same ID is a clean no-op.
        let Ok(removed_again) = registry.disconnect(record.conn_id).await else {
            panic!("disconnect should not error");
        };
        assert!(!removed_again);
    }

    #[tokio::test]
    async fn disconnect_cascades_to_subscriptions() {
        let registry = make_registry();
        let key = make_key("run");

        let Ok(record) = registry.connect(None).await else {
            panic!("connect should succeed");
        };
        let Ok(()) = registry.subscribe(record.conn_id, &key).await else {
            panic!("subscribe should succeed");
        };

        let _ = registry.disconnect(record.conn_id).await;

        let Ok(subs) = registry.subscribers_of(&key).await else {
            panic!("lookup should not error");
        };
        assert!(subs.is_empty());

        let Ok(edges) = registry.subscription_count().await else {
            panic!("count should not error");
        };
        assert_eq!(edges, 0);
    }

    #[tokio::test]
    async fn subscribe_unknown_connection_is_rejected() {
        let registry = make_registry();
        let result = registry.subscribe(ConnectionId::new(), &make_key("run")).await;
        assert!(matches!(result, Err(LexicastError::ConnectionNotFound(_))));
    }

    #[tokio::test]
    async fn prune_is_idempotent_with_disconnect() {
        let registry = make_registry();
        let Ok(record) = registry.connect(None).await else {
            panic!("connect should succeed");
        };

        let Ok(pruned) = registry.prune(record.conn_id).await else {
            panic!("prune should not error");
        };
        assert!(pruned);

        let Ok(pruned_again) = registry.prune(record.conn_id).await else {
            panic!("prune should not error");
        };
        assert!(!pruned_again);
    }

    #[tokio::test]
    async fn expire_stale_removes_only_overdue() {
        let store = Arc::new(InMemoryConnectionStore::new());
        let registry =
            ConnectionRegistry::new(Arc::clone(&store) as Arc<dyn ConnectionStore>, 900);

        let Ok(fresh) = registry.connect(None).await else {
            panic!("connect should succeed");
        };
        let Ok(stale) = registry.connect(None).await else {
            panic!("connect should succeed");
        };

        // Force one watermark into the past.
        let past = Utc::now() - chrono::Duration::minutes(1);
        let Ok(()) = store.touch(stale.conn_id, past).await else {
            panic!("touch should not error");
        };

        let Ok(removed) = registry.expire_stale(Utc::now()).await else {
            panic!("sweep should not error");
        };
        assert_eq!(removed, vec![stale.conn_id]);

        let Ok(still_there) = registry.get(fresh.conn_id).await else {
            panic!("get should not error");
        };
        assert!(still_there.is_some());
    }

    #[tokio::test]
    async fn touch_extends_lifetime() {
        let store = Arc::new(InMemoryConnectionStore::new());
        let registry =
            ConnectionRegistry::new(Arc::clone(&store) as Arc<dyn ConnectionStore>, 900);

        let Ok(record) = registry.connect(None).await else {
            panic!("connect should succeed");
        };
        let past = Utc::now() - chrono::Duration::minutes(1);
        let Ok(()) = store.touch(record.conn_id, past).await else {
            panic!("touch should not error");
        };

        // A touch slides the watermark forward again.
        let Ok(()) = registry.touch(record.conn_id).await else {
            panic!("touch should not error");
        };

        let Ok(removed) = registry.expire_stale(Utc::now()).await else {
            panic!("sweep should not error");
        };
        assert!(removed.is_empty());
    }
}
