//! Fan-out broadcaster: one envelope to every subscriber of its key.
//!
//! Delivery to each connection is independent: a slow connection is
//! bounded by the per-send timeout, a gone connection is pruned from
//! the registry, and neither affects delivery to siblings. `publish`
//! returns only after every delivery attempt has finished or timed
//! out, so a single consumer calling `publish` in a loop preserves
//! per-key event order end-to-end.

use std::sync::Arc;

use futures_util::StreamExt;

use super::push::{PushTransport, SendOutcome};
use crate::domain::{ConnectionId, EventEnvelope};
use crate::registry::ConnectionRegistry;

/// Publishes envelopes to all subscribers of a card key.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: ConnectionRegistry,
    transport: Arc<dyn PushTransport>,
    fanout_concurrency: usize,
    push_timeout: std::time::Duration,
}

impl Broadcaster {
    /// Creates a broadcaster.
    ///
    /// `fanout_concurrency` bounds how many sends run at once per
    /// publish; `push_timeout_ms` bounds each individual send.
    #[must_use]
    pub fn new(
        registry: ConnectionRegistry,
        transport: Arc<dyn PushTransport>,
        fanout_concurrency: usize,
        push_timeout_ms: u64,
    ) -> Self {
        Self {
            registry,
            transport,
            fanout_concurrency: fanout_concurrency.max(1),
            push_timeout: std::time::Duration::from_millis(push_timeout_ms),
        }
    }

    /// Delivers `envelope` to every current subscriber of its key.
    ///
    /// Subscribers are snapshotted once at entry; connections that
    /// subscribe mid-publish catch up on the next event. Infallible:
    /// every failure mode is handled per connection.
    pub async fn publish(&self, envelope: &EventEnvelope) {
        let subscribers = match self.registry.subscribers_of(&envelope.key).await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                tracing::error!(key = %envelope.key, error = %e, "subscriber lookup failed");
                return;
            }
        };
        if subscribers.is_empty() {
            tracing::debug!(
                key = %envelope.key,
                kind = envelope.event.kind(),
                "no subscribers for event"
            );
            return;
        }

        let count = subscribers.len();
        futures_util::stream::iter(subscribers)
            .for_each_concurrent(self.fanout_concurrency, |conn_id| async move {
                self.deliver_one(conn_id, envelope).await;
            })
            .await;

        tracing::debug!(
            key = %envelope.key,
            kind = envelope.event.kind(),
            subscribers = count,
            "event published"
        );
    }

    async fn deliver_one(&self, conn_id: ConnectionId, envelope: &EventEnvelope) {
        let send = self.transport.send(conn_id, envelope);
        match tokio::time::timeout(self.push_timeout, send).await {
            Ok(SendOutcome::Delivered) => {}
            Ok(SendOutcome::Gone) => {
                if let Err(e) = self.registry.prune(conn_id).await {
                    tracing::warn!(conn_id = %conn_id, error = %e, "prune failed");
                }
            }
            Ok(SendOutcome::Transient(reason)) => {
                tracing::warn!(
                    conn_id = %conn_id,
                    key = %envelope.key,
                    reason = %reason,
                    "transient push failure, skipping"
                );
            }
            Err(_) => {
                tracing::warn!(
                    conn_id = %conn_id,
                    key = %envelope.key,
                    timeout = ?self.push_timeout,
                    "push timed out, skipping"
                );
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::{CardEvent, CardKey};
    use crate::registry::InMemoryConnectionStore;

    /// Transport with per-connection scripted outcomes; records which
    /// connections were delivered to.
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        outcomes: Mutex<HashMap<ConnectionId, SendOutcome>>,
        delivered: Mutex<Vec<ConnectionId>>,
    }

    impl ScriptedTransport {
        async fn script(&self, conn_id: ConnectionId, outcome: SendOutcome) {
            self.outcomes.lock().await.insert(conn_id, outcome);
        }

        async fn delivered(&self) -> Vec<ConnectionId> {
            self.delivered.lock().await.clone()
        }
    }

    #[async_trait]
    impl PushTransport for ScriptedTransport {
        async fn send(&self, conn_id: ConnectionId, _envelope: &EventEnvelope) -> SendOutcome {
            let outcome = self
                .outcomes
                .lock()
                .await
                .get(&conn_id)
                .cloned()
                .unwrap_or(SendOutcome::Delivered);
            if outcome == SendOutcome::Delivered {
                self.delivered.lock().await.push(conn_id);
            }
            outcome
        }
    }

    /// Transport that never completes a send.
    #[derive(Debug, Default)]
    struct StuckTransport;

    #[async_trait]
    impl PushTransport for StuckTransport {
        async fn send(&self, _conn_id: ConnectionId, _envelope: &EventEnvelope) -> SendOutcome {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            SendOutcome::Delivered
        }
    }

    fn make_key() -> CardKey {
        let Ok(key) = CardKey::new("en", "es", "noun", "run") else {
            panic!("valid key");
        };
        key
    }

    fn make_registry() -> ConnectionRegistry {
        ConnectionRegistry::new(Arc::new(InMemoryConnectionStore::new()), 900)
    }

    #[tokio::test]
    async fn delivers_to_every_subscriber() {
        let registry = make_registry();
        let transport = Arc::new(ScriptedTransport::default());
        let key = make_key();

        let mut conn_ids = Vec::new();
        for _ in 0..3 {
            let Ok(record) = registry.connect(None).await else {
                panic!("connect should succeed");
            };
            let Ok(()) = registry.subscribe(record.conn_id, &key).await else {
                panic!("subscribe should succeed");
            };
            conn_ids.push(record.conn_id);
        }

        let broadcaster = Broadcaster::new(
            registry,
            Arc::clone(&transport) as Arc<dyn PushTransport>,
            16,
            2000,
        );
        broadcaster
            .publish(&EventEnvelope::new(key, CardEvent::Started))
            .await;

        let mut delivered = transport.delivered().await;
        delivered.sort_by_key(|id| *id.as_uuid());
        conn_ids.sort_by_key(|id| *id.as_uuid());
        assert_eq!(delivered, conn_ids);
    }

    #[tokio::test]
    async fn gone_connection_is_pruned_and_siblings_still_deliver() {
        let registry = make_registry();
        let transport = Arc::new(ScriptedTransport::default());
        let key = make_key();

        let mut conn_ids = Vec::new();
        for _ in 0..3 {
            let Ok(record) = registry.connect(None).await else {
                panic!("connect should succeed");
            };
            let Ok(()) = registry.subscribe(record.conn_id, &key).await else {
                panic!("subscribe should succeed");
            };
            conn_ids.push(record.conn_id);
        }
        let Some(gone_id) = conn_ids.get(1).copied() else {
            panic!("three connections expected");
        };
        transport.script(gone_id, SendOutcome::Gone).await;

        let broadcaster = Broadcaster::new(
            registry.clone(),
            Arc::clone(&transport) as Arc<dyn PushTransport>,
            16,
            2000,
        );
        broadcaster
            .publish(&EventEnvelope::new(key.clone(), CardEvent::Started))
            .await;

        // The two live connections still got the event.
        let delivered = transport.delivered().await;
        assert_eq!(delivered.len(), 2);
        assert!(!delivered.contains(&gone_id));

        // The gone connection was removed, subscriptions included.
        let Ok(remaining) = registry.get(gone_id).await else {
            panic!("get should not error");
        };
        assert!(remaining.is_none());
        let Ok(subscribers) = registry.subscribers_of(&key).await else {
            panic!("lookup should not error");
        };
        assert_eq!(subscribers.len(), 2);
    }

    #[tokio::test]
    async fn transient_failure_does_not_prune() {
        let registry = make_registry();
        let transport = Arc::new(ScriptedTransport::default());
        let key = make_key();

        let Ok(record) = registry.connect(None).await else {
            panic!("connect should succeed");
        };
        let Ok(()) = registry.subscribe(record.conn_id, &key).await else {
            panic!("subscribe should succeed");
        };
        transport
            .script(record.conn_id, SendOutcome::Transient("flaky".to_string()))
            .await;

        let broadcaster = Broadcaster::new(registry.clone(), transport, 16, 2000);
        broadcaster
            .publish(&EventEnvelope::new(key, CardEvent::Started))
            .await;

        let Ok(still_there) = registry.get(record.conn_id).await else {
            panic!("get should not error");
        };
        assert!(still_there.is_some());
    }

    #[tokio::test]
    async fn stuck_send_is_bounded_by_the_timeout() {
        let registry = make_registry();
        let key = make_key();

        let Ok(record) = registry.connect(None).await else {
            panic!("connect should succeed");
        };
        let Ok(()) = registry.subscribe(record.conn_id, &key).await else {
            panic!("subscribe should succeed");
        };

        let broadcaster =
            Broadcaster::new(registry.clone(), Arc::new(StuckTransport), 16, 20);
        let envelope = EventEnvelope::new(key, CardEvent::Started);
        let publish = broadcaster.publish(&envelope);
        let bounded =
            tokio::time::timeout(std::time::Duration::from_secs(5), publish).await;
        assert!(bounded.is_ok(), "publish must not hang on a stuck send");

        // A timeout is transient: the connection survives.
        let Ok(still_there) = registry.get(record.conn_id).await else {
            panic!("get should not error");
        };
        assert!(still_there.is_some());
    }

    #[tokio::test]
    async fn no_subscribers_is_a_quiet_noop() {
        let registry = make_registry();
        let transport = Arc::new(ScriptedTransport::default());
        let broadcaster = Broadcaster::new(
            registry,
            Arc::clone(&transport) as Arc<dyn PushTransport>,
            16,
            2000,
        );

        broadcaster
            .publish(&EventEnvelope::new(make_key(), CardEvent::Started))
            .await;

        assert!(transport.delivered().await.is_empty());
    }
}
