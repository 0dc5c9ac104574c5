//! Event forwarder: the buffer between workers and the broadcaster.
//!
//! Workers publish fire-and-forget: [`EventForwarder::forward`] is a
//! non-blocking `try_send` into a bounded channel, so a slow fan-out
//! can never stall the pipeline. When the buffer is full the event is
//! dropped with a warning; subscribers still observe a prefix of the
//! stream plus the terminal event on their own channel, and the REST
//! poll endpoint covers anything missed.
//!
//! A single [`run_broadcaster`] task drains the channel, publishing one
//! envelope at a time. That single consumer is what turns the queue's
//! per-key delivery order into per-subscriber arrival order.

use tokio::sync::mpsc;

use super::broadcaster::Broadcaster;
use crate::domain::EventEnvelope;

/// Clonable sending half handed to every worker.
#[derive(Debug, Clone)]
pub struct EventForwarder {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventForwarder {
    /// Creates the forwarder and the receiver half for the broadcaster
    /// task.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Hands an envelope to the broadcaster task without blocking.
    ///
    /// A full buffer drops the envelope with a warning. A closed
    /// channel (broadcaster task gone, i.e. shutdown) drops silently
    /// at debug level.
    pub fn forward(&self, envelope: EventEnvelope) {
        match self.tx.try_send(envelope) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(envelope)) => {
                tracing::warn!(
                    key = %envelope.key,
                    kind = envelope.event.kind(),
                    "event buffer full, dropping event"
                );
            }
            Err(mpsc::error::TrySendError::Closed(envelope)) => {
                tracing::debug!(
                    key = %envelope.key,
                    kind = envelope.event.kind(),
                    "broadcaster task gone, dropping event"
                );
            }
        }
    }
}

/// Spawns the single broadcaster task.
///
/// Drains the forwarder channel until every sender is dropped, then
/// exits. One publish completes before the next begins.
pub fn spawn_broadcaster(
    broadcaster: Broadcaster,
    mut rx: mpsc::Receiver<EventEnvelope>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            broadcaster.publish(&envelope).await;
        }
        tracing::debug!("broadcaster task stopped");
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{CardEvent, CardKey};

    fn make_envelope(event: CardEvent) -> EventEnvelope {
        let Ok(key) = CardKey::new("en", "es", "noun", "run") else {
            panic!("valid key");
        };
        EventEnvelope::new(key, event)
    }

    #[tokio::test]
    async fn forward_is_nonblocking_and_ordered() {
        let (forwarder, mut rx) = EventForwarder::channel(8);

        forwarder.forward(make_envelope(CardEvent::Started));
        forwarder.forward(make_envelope(CardEvent::Completed {
            result: serde_json::json!({"card": 1}),
        }));

        let Some(first) = rx.recv().await else {
            panic!("first envelope should arrive");
        };
        let Some(second) = rx.recv().await else {
            panic!("second envelope should arrive");
        };
        assert_eq!(first.event.kind(), "started");
        assert_eq!(second.event.kind(), "completed");
    }

    #[tokio::test]
    async fn overflow_drops_newest_without_blocking() {
        let (forwarder, mut rx) = EventForwarder::channel(1);

        forwarder.forward(make_envelope(CardEvent::Started));
        // Buffer full: this one is dropped, and forward returns at once.
        forwarder.forward(make_envelope(CardEvent::Failed {
            reason: "late".to_string(),
        }));

        let Some(first) = rx.recv().await else {
            panic!("buffered envelope should arrive");
        };
        assert_eq!(first.event.kind(), "started");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_channel_does_not_panic() {
        let (forwarder, rx) = EventForwarder::channel(1);
        drop(rx);
        forwarder.forward(make_envelope(CardEvent::Started));
    }
}
