//! Job identity and lifecycle state.
//!
//! A [`Job`] is one admitted unit of card-generation work for a
//! [`CardKey`]. At most one non-terminal job exists per key at any
//! instant; that invariant is enforced by the work queue's conditional
//! insert, not here.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CardKey;

/// Unique identifier for an admitted job.
///
/// Wraps a UUID v4, generated once at admission and immutable
/// thereafter. Carried in queue lanes, dead-letter entries, and the
/// `job_id` field of API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(uuid::Uuid);

impl JobId {
    /// Creates a new random `JobId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `JobId` from an existing [`uuid::Uuid`].
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

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
///
/// `Pending` and `InFlight` are the non-terminal states; a job reaches
/// exactly one of `Done` or `Failed`, after which its key is free for a
/// new admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Admitted and waiting in its key lane.
    Pending,
    /// Dequeued by a worker; the pipeline is running.
    InFlight,
    /// Terminal: pipeline completed and the result was persisted.
    Done,
    /// Terminal: pipeline failed or the visibility window expired.
    Failed,
}

impl JobStatus {
    /// Returns `true` for `Done` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns the status as a static string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// One admitted unit of card-generation work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier.
    pub id: JobId,
    /// Canonical key the job was admitted for.
    pub key: CardKey,
    /// When the job was admitted.
    pub enqueued_at: DateTime<Utc>,
    /// Current lifecycle state.
    pub status: JobStatus,
}

impl Job {
    /// Creates a new `Pending` job for the given key.
    #[must_use]
    pub fn new(key: CardKey) -> Self {
        Self {
            id: JobId::new(),
            key,
            enqueued_at: Utc::now(),
            status: JobStatus::Pending,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_key() -> CardKey {
        let Ok(key) = CardKey::new("en", "es", "noun", "run") else {
            panic!("valid key");
        };
        key
    }

    #[test]
    fn job_id_is_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn new_job_is_pending() {
        let job = Job::new(make_key());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InFlight.is_terminal());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::InFlight).ok();
        assert_eq!(json.as_deref(), Some("\"in_flight\""));
    }

    #[test]
    fn status_as_str() {
        assert_eq!(JobStatus::Pending.as_str(), "pending");
        assert_eq!(JobStatus::InFlight.as_str(), "in_flight");
        assert_eq!(JobStatus::Done.as_str(), "done");
        assert_eq!(JobStatus::Failed.as_str(), "failed");
    }
}
