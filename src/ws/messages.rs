//! WebSocket message types: client commands and server replies.
//!
//! Card events pushed to subscribers use the event envelope from
//! [`crate::domain::EventEnvelope`] unchanged; the types here cover
//! only the control protocol around them.

use serde::{Deserialize, Serialize};

/// Messages a client can send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe this connection to a card key.
    Subscribe {
        /// Canonical or raw key, e.g. `en|es|noun|run`. Normalized
        /// server-side.
        key: String,
    },
    /// Remove this connection's subscription to a card key.
    Unsubscribe {
        /// The key to unsubscribe from.
        key: String,
    },
    /// Application-level keepalive; any frame slides the expiry
    /// watermark, this one exists to do nothing else.
    Ping,
}

/// Replies and notices the server sends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message after the upgrade; carries the connection ID the
    /// client needs for REST submissions.
    Welcome {
        /// This connection's server-assigned ID.
        connection_id: uuid::Uuid,
    },
    /// Subscription confirmed, echoing the canonical key.
    Subscribed {
        /// Canonical card key.
        key: String,
    },
    /// Unsubscription processed.
    Unsubscribed {
        /// Canonical card key.
        key: String,
    },
    /// Reply to [`ClientMessage::Ping`].
    Pong,
    /// The previous client frame could not be processed.
    Error {
        /// What went wrong.
        message: String,
    },
}
