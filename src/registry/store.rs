//! Connection store abstraction.
//!
//! [`ConnectionStore`] is the injected storage seam for connection and
//! subscription state: an in-memory implementation backs tests and
//! single-process deployments, a PostgreSQL implementation backs
//! durable ones. The registry façade is the only writer; the
//! broadcaster reads subscriber sets and prunes dead connections
//! through the same conditional-delete path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{CardKey, ConnectionId, ConnectionRecord};
use crate::error::LexicastError;

/// Storage backend for connections and their subscription edges.
///
/// Implementations must keep two invariants:
/// - a subscription can never reference a connection the store does not
///   hold: `add_subscription` fails for unknown connections, and
///   `remove_connection` cascades to all subscriptions atomically;
/// - `connections_for_key` is a secondary-index lookup, not a scan, as
///   it runs once per published event.
#[async_trait]
pub trait ConnectionStore: Send + Sync + std::fmt::Debug {
    /// Inserts a new connection record.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::PersistenceError`] on backend failure.
    async fn insert_connection(&self, record: ConnectionRecord) -> Result<(), LexicastError>;

    /// Removes a connection and all its subscriptions.
    ///
    /// Returns `false` if the connection was not present (idempotent:
    /// a disconnect racing a prune is not an error).
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::PersistenceError`] on backend failure.
    async fn remove_connection(&self, conn_id: ConnectionId) -> Result<bool, LexicastError>;

    /// Looks up one connection record.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::PersistenceError`] on backend failure.
    async fn get_connection(
        &self,
        conn_id: ConnectionId,
    ) -> Result<Option<ConnectionRecord>, LexicastError>;

    /// Adds a subscription edge from a connection to a key.
    ///
    /// Adding an edge that already exists is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::ConnectionNotFound`] if the connection
    /// is not registered, or [`LexicastError::PersistenceError`] on
    /// backend failure.
    async fn add_subscription(
        &self,
        conn_id: ConnectionId,
        key: &CardKey,
    ) -> Result<(), LexicastError>;

    /// Removes one subscription edge. Returns `false` if the edge did
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::PersistenceError`] on backend failure.
    async fn remove_subscription(
        &self,
        conn_id: ConnectionId,
        key: &CardKey,
    ) -> Result<bool, LexicastError>;

    /// Returns all connections currently subscribed to a key.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::PersistenceError`] on backend failure.
    async fn connections_for_key(&self, key: &CardKey)
    -> Result<Vec<ConnectionId>, LexicastError>;

    /// Returns all connections owned by a user.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::PersistenceError`] on backend failure.
    async fn connections_for_user(
        &self,
        user_id: uuid::Uuid,
    ) -> Result<Vec<ConnectionId>, LexicastError>;

    /// Returns connections whose expiry watermark is at or before `now`.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::PersistenceError`] on backend failure.
    async fn expired_connections(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConnectionId>, LexicastError>;

    /// Slides a connection's expiry watermark forward. Unknown
    /// connections are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::PersistenceError`] on backend failure.
    async fn touch(
        &self,
        conn_id: ConnectionId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), LexicastError>;

    /// Returns the number of live connections.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::PersistenceError`] on backend failure.
    async fn connection_count(&self) -> Result<usize, LexicastError>;

    /// Returns the number of subscription edges.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::PersistenceError`] on backend failure.
    async fn subscription_count(&self) -> Result<usize, LexicastError>;
}
