//! Result store trait: the finished-card cache admission checks first.

use async_trait::async_trait;

use crate::domain::CardKey;
use crate::error::LexicastError;

/// Keyed store of finished card payloads.
///
/// `put` must be visible to subsequent `get`s before the job that
/// produced the result is acked; the worker relies on that ordering so
/// an admission arriving after `completed` finds the result here.
#[async_trait]
pub trait ResultStore: Send + Sync + std::fmt::Debug {
    /// Returns the finished card for `key`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] on storage failure.
    async fn get(&self, key: &CardKey) -> Result<Option<serde_json::Value>, LexicastError>;

    /// Stores (or replaces) the finished card for `key`.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] on storage failure.
    async fn put(&self, key: &CardKey, result: serde_json::Value) -> Result<(), LexicastError>;

    /// Number of stored results.
    ///
    /// # Errors
    ///
    /// Returns a [`LexicastError::PersistenceError`] on storage failure.
    async fn count(&self) -> Result<usize, LexicastError>;
}
