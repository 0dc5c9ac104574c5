//! PostgreSQL implementation of the result store.
//!
//! One table: `card_results (card_key TEXT PK, result JSONB,
//! created_at, updated_at)`. Writes are upserts on the key, so a
//! requeued job that regenerates a card replaces the old payload.

use async_trait::async_trait;
use sqlx::PgPool;

use super::result_store::ResultStore;
use crate::domain::CardKey;
use crate::error::LexicastError;

/// PostgreSQL-backed [`ResultStore`] using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresResultStore {
    pool: PgPool,
}

impl PostgresResultStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `card_results` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] on database failure.
    pub async fn ensure_schema(&self) -> Result<(), LexicastError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS card_results ( \
                card_key TEXT PRIMARY KEY, \
                result JSONB NOT NULL, \
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now() \
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ResultStore for PostgresResultStore {
    async fn get(&self, key: &CardKey) -> Result<Option<serde_json::Value>, LexicastError> {
        let row = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT result FROM card_results WHERE card_key = $1",
        )
        .bind(key.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(row)
    }

    async fn put(&self, key: &CardKey, result: serde_json::Value) -> Result<(), LexicastError> {
        sqlx::query(
            "INSERT INTO card_results (card_key, result) VALUES ($1, $2) \
             ON CONFLICT (card_key) DO UPDATE \
             SET result = EXCLUDED.result, updated_at = now()",
        )
        .bind(key.to_string())
        .bind(result)
        .execute(&self.pool)
        .await
        .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(())
    }

    async fn count(&self) -> Result<usize, LexicastError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM card_results")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LexicastError::PersistenceError(e.to_string()))?;

        Ok(usize::try_from(count).unwrap_or(0))
    }
}
