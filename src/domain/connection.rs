//! Push-connection identity and registry record.
//!
//! [`ConnectionId`] is the transport-assigned identity of one live push
//! channel; [`ConnectionRecord`] is what the connection registry stores
//! about it. The outbound socket half itself lives in the push
//! transport, not here.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a live push connection.
///
/// Wraps a UUID v4 assigned by the transport layer at upgrade time.
/// Opaque to clients; carried back by the CRUD layer in `SubmitWork`
/// requests so admissions can be tied to the requesting channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a new random `ConnectionId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `ConnectionId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry record for one live connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Connection identifier.
    pub conn_id: ConnectionId,
    /// Owning user, when the connection authenticated upstream.
    /// Anonymous connections are allowed.
    pub user_id: Option<uuid::Uuid>,
    /// When the connection was established.
    pub connected_at: DateTime<Utc>,
    /// Expiry watermark: past this instant the sweep may remove the
    /// connection. Slid forward on inbound activity.
    pub expires_at: DateTime<Utc>,
}

impl ConnectionRecord {
    /// Creates a record for a connection established now, expiring
    /// after `ttl`.
    #[must_use]
    pub fn new(conn_id: ConnectionId, user_id: Option<uuid::Uuid>, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            conn_id,
            user_id,
            connected_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns `true` if the record is past its expiry watermark.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
