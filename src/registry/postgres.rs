//! PostgreSQL implementation of the connection store.
//!
//! Two tables back the registry:
//!
//! - `connections (conn_id UUID PK, user_id UUID NULL, connected_at, expires_at)`
//! - `subscriptions (conn_id UUID FK ON DELETE CASCADE, card_key TEXT,
//!   PRIMARY KEY (conn_id, card_key))`
//!
//! The foreign key with `ON DELETE CASCADE` gives the same guarantee the
//! in-memory store enforces under its write lock: removing a connection
//! atomically removes every subscription edge that points at it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::store::ConnectionStore;
use crate::domain::{CardKey, ConnectionId, ConnectionRecord};
use crate::error::LexicastError;

/// PostgreSQL-backed [`ConnectionStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresConnectionStore {
    pool: PgPool,
}

impl PostgresConnectionStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the registry tables and indexes if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] on database failure.
    pub async fn ensure_schema(&self) -> Result<(), LexicastError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS connections ( \
                conn_id UUID PRIMARY KEY, \
                user_id UUID, \
                connected_at TIMESTAMPTZ NOT NULL, \
                expires_at TIMESTAMPTZ NOT NULL \
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS subscriptions ( \
                conn_id UUID NOT NULL REFERENCES connections (conn_id) ON DELETE CASCADE, \
                card_key TEXT NOT NULL, \
                PRIMARY KEY (conn_id, card_key) \
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_subscriptions_card_key \
             ON subscriptions (card_key)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_connections_user_id \
             ON connections (user_id) WHERE user_id IS NOT NULL",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_connections_expires_at \
             ON connections (expires_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ConnectionStore for PostgresConnectionStore {
    async fn insert_connection(&self, record: ConnectionRecord) -> Result<(), LexicastError> {
        sqlx::query(
            "INSERT INTO connections (conn_id, user_id, connected_at, expires_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (conn_id) DO UPDATE SET expires_at = EXCLUDED.expires_at",
        )
        .bind(record.conn_id.as_uuid())
        .bind(record.user_id)
        .bind(record.connected_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(())
    }

    async fn remove_connection(&self, conn_id: ConnectionId) -> Result<bool, LexicastError> {
        // Subscriptions go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM connections WHERE conn_id = $1")
            .bind(conn_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_connection(
        &self,
        conn_id: ConnectionId,
    ) -> Result<Option<ConnectionRecord>, LexicastError> {
        let row = sqlx::query_as::<_, (Uuid, Option<Uuid>, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT conn_id, user_id, connected_at, expires_at \
             FROM connections WHERE conn_id = $1",
        )
        .bind(conn_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(row.map(|(id, user_id, connected_at, expires_at)| ConnectionRecord {
            conn_id: ConnectionId::from_uuid(id),
            user_id,
            connected_at,
            expires_at,
        }))
    }

    async fn add_subscription(
        &self,
        conn_id: ConnectionId,
        key: &CardKey,
    ) -> Result<(), LexicastError> {
        // Guarded insert: only lands when the connection row still exists,
        // so a concurrent disconnect cannot leave an orphan edge.
        let result = sqlx::query(
            "INSERT INTO subscriptions (conn_id, card_key) \
             SELECT $1, $2 WHERE EXISTS (SELECT 1 FROM connections WHERE conn_id = $1) \
             ON CONFLICT (conn_id, card_key) DO NOTHING",
        )
        .bind(conn_id.as_uuid())
        .bind(key.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        if result.rows_affected() == 0 {
            // Either a duplicate edge (fine) or a dead connection (error).
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM connections WHERE conn_id = $1)",
            )
            .bind(conn_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

            if !exists {
                return Err(LexicastError::ConnectionNotFound(*conn_id.as_uuid()));
            }
        }

        Ok(())
    }

    async fn remove_subscription(
        &self,
        conn_id: ConnectionId,
        key: &CardKey,
    ) -> Result<bool, LexicastError> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE conn_id = $1 AND card_key = $2")
                .bind(conn_id.as_uuid())
                .bind(key.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn connections_for_key(
        &self,
        key: &CardKey,
    ) -> Result<Vec<ConnectionId>, LexicastError> {
        let rows = sqlx::query_scalar::<_, Uuid>(
            "SELECT conn_id FROM subscriptions WHERE card_key = $1",
        )
        .bind(key.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(rows.into_iter().map(ConnectionId::from_uuid).collect())
    }

    async fn connections_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConnectionId>, LexicastError> {
        let rows = sqlx::query_scalar::<_, Uuid>(
            "SELECT conn_id FROM connections WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(rows.into_iter().map(ConnectionId::from_uuid).collect())
    }

    async fn expired_connections(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ConnectionId>, LexicastError> {
        let rows = sqlx::query_scalar::<_, Uuid>(
            "SELECT conn_id FROM connections WHERE expires_at <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(rows.into_iter().map(ConnectionId::from_uuid).collect())
    }

    async fn touch(
        &self,
        conn_id: ConnectionId,
        expires_at: DateTime<Utc>,
    ) -> Result<(), LexicastError> {
        sqlx::query("UPDATE connections SET expires_at = $2 WHERE conn_id = $1")
            .bind(conn_id.as_uuid())
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(())
    }

    async fn connection_count(&self) -> Result<usize, LexicastError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM connections")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn subscription_count(&self) -> Result<usize, LexicastError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}
