//! In-memory connection store.
//!
//! [`InMemoryConnectionStore`] keeps the primary connection map and the
//! `by_key` / `by_user` secondary indexes under a single
//! [`tokio::sync::RwLock`], so every mutation updates all indexes
//! atomically. Backs tests and persistence-disabled deployments.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::store::ConnectionStore;
use crate::domain::{CardKey, ConnectionId, ConnectionRecord};
use crate::error::LexicastError;

/// All connection state behind one lock.
///
/// `keys_by_conn` is the reverse of `by_key` and exists so that a
/// connection removal can cascade without scanning every key bucket.
#[derive(Debug, Default)]
struct StoreState {
    connections: HashMap<ConnectionId, ConnectionRecord>,
    by_key: HashMap<CardKey, HashSet<ConnectionId>>,
    by_user: HashMap<uuid::Uuid, HashSet<ConnectionId>>,
    keys_by_conn: HashMap<ConnectionId, HashSet<CardKey>>,
}

/// In-memory [`ConnectionStore`] implementation.
///
/// # Concurrency
///
/// - Reads (`connections_for_key`, counts) take the shared lock and run
///   concurrently.
/// - Mutations serialize on the write lock, which is what makes the
///   connection-removal cascade atomic with respect to
///   `connections_for_key` readers.
#[derive(Debug, Default)]
pub struct InMemoryConnectionStore {
    state: RwLock<StoreState>,
}

impl InMemoryConnectionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for InMemoryConnectionStore {
    async fn insert_connection(&self, record: ConnectionRecord) -> Result<(), LexicastError> {
        let mut state = self.state.write().await;
        if let Some(user_id) = record.user_id {
            state.by_user.entry(user_id).or_default().insert(record.conn_id);
        }
        state.connections.insert(record.conn_id, record);
        Ok(())
    }

    async fn remove_connection(&self, conn_id: ConnectionId) -> Result<bool, LexicastError> {
        let mut state = self.state.write().await;
        let Some(record) = state.connections.remove(&conn_id) else {
            return Ok(false);
        };
        if let Some(user_id) = record.user_id
            && let Some(set) = state.by_user.get_mut(&user_id)
        {
            set.remove(&conn_id);
            if set.is_empty() {
                state.by_user.remove(&user_id);
            }
        }
        // Cascade: drop every subscription edge this connection held.
        if let Some(keys) = state.keys_by_conn.remove(&conn_id) {
            for key in keys {
                if let Some(set) = state.by_key.get_mut(&key) {
                    set.remove(&conn_id);
                    if set.is_empty() {
                        state.by_key.remove(&key);
                    }
                }
            }
        }
        Ok(true)
    }

    async fn get_connection(
        &self,
        conn_id: ConnectionId,
    ) -> Result<Option<ConnectionRecord>, LexicastError> {
        Ok(self.state.read().await.connections.get(&conn_id).cloned())
    }

    async fn add_subscription(
        &self,
        conn_id: ConnectionId,
        key: &CardKey,
    ) -> Result<(), LexicastError> {
        let mut state = self.state.write().await;
        if !state.connections.contains_key(&conn_id) {
            return Err(LexicastError::ConnectionNotFound(*conn_id.as_uuid()));
        }
        state.by_key.entry(key.clone()).or_default().insert(conn_id);
        state
            .keys_by_conn
            .entry(conn_id)
            .or_default()
            .insert(key.clone());
        Ok(())
    }

    async fn remove_subscription(
        &self,
        conn_id: ConnectionId,
        key: &CardKey,
    ) -> Result<bool, LexicastError> {
        let mut state = self.state.write().await;
        let mut existed = false;
        if let Some(set) = state.by_key.get_mut(key) {
            existed = set.remove(&conn_id);
            if set.is_empty() {
                state.by_key.remove(key);
            }
        }
        if let Some(keys) = state.keys_by_conn.get_mut(&conn_id) {
            keys.remove(key);
            if keys.is_empty() {
                state.keys_by_conn.remove(&conn_id);
            }
        }
        Ok(existed)
    }

    async fn connections_for_key(
        &self,
        key: &CardKey,
    ) -> Result<Vec<ConnectionId>, LexicastError> {
        let state = self.state.read().await;
        Ok(state
            .by_key
            .get(key)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn connections_for_user(
        &self,
        user_id: uuid::Uuid,
    ) -> Result<Vec<ConnectionId>, LexicastError> {
        let state = self.state.read().await;
        Ok(state
            .by_user
            .get(&user_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn expired_connections(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConnectionId>, LexicastError> {
        let state = self.state.read().await;
        Ok(state
            .connections
            .values()
            .filter(|record| record.is_expired_at(now))
            .map(|record| record.conn_id)
            .collect())
    }

    async fn touch(
        &self,
        conn_id: ConnectionId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), LexicastError> {
        let mut state = self.state.write().await;
        if let Some(record) = state.connections.get_mut(&conn_id) {
            record.expires_at = expires_at;
        }
        Ok(())
    }

    async fn connection_count(&self) -> Result<usize, LexicastError> {
        Ok(self.state.read().await.connections.len())
    }

    async fn subscription_count(&self) -> Result<usize, LexicastError> {
        let state = self.state.read().await;
        Ok(state.keys_by_conn.values().map(HashSet::len).sum())
    }
}
