//! In-memory result store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::result_store::ResultStore;
use crate::domain::CardKey;
use crate::error::LexicastError;

/// [`ResultStore`] backed by a `RwLock`ed map.
///
/// Used in tests and when `PERSISTENCE_ENABLED` is off; results live
/// only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryResultStore {
    results: RwLock<HashMap<CardKey, serde_json::Value>>,
}

impl InMemoryResultStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn get(&self, key: &CardKey) -> Result<Option<serde_json::Value>, LexicastError> {
        Ok(self.results.read().await.get(key).cloned())
    }

    async fn put(&self, key: &CardKey, result: serde_json::Value) -> Result<(), LexicastError> {
        self.results.write().await.insert(key.clone(), result);
        Ok(())
    }

    async fn count(&self) -> Result<usize, LexicastError> {
        Ok(self.results.read().await.len())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_key(term: &str) -> CardKey {
        let Ok(key) = CardKey::new("en", "es", "noun", term) else {
            panic!("valid key");
        };
        key
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = InMemoryResultStore::new();
        let Ok(result) = store.get(&make_key("run")).await else {
            panic!("get should not error");
        };
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn put_then_get() {
        let store = InMemoryResultStore::new();
        let key = make_key("run");
        let card = serde_json::json!({"translation": "correr"});

        let Ok(()) = store.put(&key, card.clone()).await else {
            panic!("put should not error");
        };
        let Ok(Some(found)) = store.get(&key).await else {
            panic!("result should exist");
        };
        assert_eq!(found, card);

        let Ok(count) = store.count().await else {
            panic!("count should not error");
        };
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn put_replaces_existing() {
        let store = InMemoryResultStore::new();
        let key = make_key("run");

        let _ = store.put(&key, serde_json::json!({"v": 1})).await;
        let _ = store.put(&key, serde_json::json!({"v": 2})).await;

        let Ok(Some(found)) = store.get(&key).await else {
            panic!("result should exist");
        };
        assert_eq!(found, serde_json::json!({"v": 2}));
    }
}
