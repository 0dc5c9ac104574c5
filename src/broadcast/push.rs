//! Push transport: the seam between fan-out and the wire.
//!
//! [`PushTransport`] abstracts "deliver one envelope to one
//! connection" so the broadcaster never touches socket types. The
//! WebSocket implementation maps connection IDs to outbound channel
//! senders; the per-connection socket task drains its channel into the
//! actual sink.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};

use crate::domain::{ConnectionId, EventEnvelope};

/// Result of one delivery attempt to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The envelope was handed to the connection's outbound channel.
    Delivered,
    /// The connection has no live outbound channel: the client is gone
    /// and the registry entry should be pruned.
    Gone,
    /// A failure that does not prove the client is gone. Logged and
    /// skipped; the expiry sweep remains the backstop.
    Transient(String),
}

/// Delivers envelopes to individual connections.
#[async_trait]
pub trait PushTransport: Send + Sync + std::fmt::Debug {
    /// Attempts to deliver `envelope` to `conn_id`.
    async fn send(&self, conn_id: ConnectionId, envelope: &EventEnvelope) -> SendOutcome;
}

/// WebSocket-backed [`PushTransport`].
///
/// Holds the outbound sender for every attached connection. Senders
/// are unbounded: the socket task drains them continuously, and a
/// client that stops draining is caught by the expiry sweep, not by
/// backpressure here.
#[derive(Debug, Default)]
pub struct WsPushTransport {
    senders: RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<String>>>,
}

impl WsPushTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an outbound channel for a connection and returns the
    /// receiver half for the socket task to drain.
    pub async fn attach(&self, conn_id: ConnectionId) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.write().await.insert(conn_id, tx);
        rx
    }

    /// Drops the outbound channel for a connection.
    ///
    /// Subsequent sends to this ID report [`SendOutcome::Gone`].
    pub async fn detach(&self, conn_id: ConnectionId) {
        self.senders.write().await.remove(&conn_id);
    }

    /// Number of attached connections.
    pub async fn attached_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

#[async_trait]
impl PushTransport for WsPushTransport {
    async fn send(&self, conn_id: ConnectionId, envelope: &EventEnvelope) -> SendOutcome {
        let json = match serde_json::to_string(envelope) {
            Ok(json) => json,
            Err(e) => return SendOutcome::Transient(e.to_string()),
        };
        let senders = self.senders.read().await;
        match senders.get(&conn_id) {
            Some(tx) if tx.send(json).is_ok() => SendOutcome::Delivered,
            // Closed channel or unknown ID: the socket task is gone.
            _ => SendOutcome::Gone,
        }
    }
}
