//! Progress and outcome events for a job.
//!
//! Every stage of a running job emits a [`CardEvent`], wrapped in an
//! [`EventEnvelope`] and fanned out to the key's subscribers. Events are
//! transient by design: they are not persisted beyond delivery, and the
//! source of truth for the outcome is the result store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CardKey;

/// One progress or outcome event for a card-generation job.
///
/// Exactly one terminal event (`Completed`, `CacheHit`, or `Failed`) is
/// published per admission. `result` payloads serialize under the wire
/// field `data` so the envelope shape stays uniform across event types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardEvent {
    /// The job was dequeued and the pipeline is starting.
    Started,

    /// One named pipeline stage produced output.
    StageUpdate {
        /// Stage name as reported by the pipeline (opaque to the core).
        stage: String,
        /// Stage-specific payload, forwarded verbatim.
        data: serde_json::Value,
    },

    /// The pipeline finished and the result was persisted.
    Completed {
        /// The finished card content.
        #[serde(rename = "data")]
        result: serde_json::Value,
    },

    /// A completed result already existed; no job was run.
    CacheHit {
        /// The previously persisted card content.
        #[serde(rename = "data")]
        result: serde_json::Value,
    },

    /// The pipeline failed; the job was dead-lettered.
    Failed {
        /// Human-readable failure description.
        reason: String,
    },
}

impl CardEvent {
    /// Returns the wire-level event type as a static string slice.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::StageUpdate { .. } => "stage_update",
            Self::Completed { .. } => "completed",
            Self::CacheHit { .. } => "cache_hit",
            Self::Failed { .. } => "failed",
        }
    }

    /// Returns `true` for `Completed`, `CacheHit`, and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::CacheHit { .. } | Self::Failed { .. }
        )
    }
}

/// Wire envelope pushed to subscribers.
///
/// Serializes to the stable payload shape
/// `{"key", "type", "stage"?, "data"?, "reason"?, "ts"}`: the event
/// fields are flattened next to the key and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Canonical key the event belongs to.
    pub key: CardKey,
    /// The event itself, flattened into the envelope.
    #[serde(flatten)]
    pub event: CardEvent,
    /// Server-side emission timestamp (ISO-8601).
    pub ts: DateTime<Utc>,
}

impl EventEnvelope {
    /// Wraps an event for the given key, stamping the current time.
    #[must_use]
    pub fn new(key: CardKey, event: CardEvent) -> Self {
        Self {
            key,
            event,
            ts: Utc::now(),
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

    fn to_json(envelope: &EventEnvelope) -> serde_json::Value {
        let Ok(value) = serde_json::to_value(envelope) else {
            panic!("envelope must serialize");
        };
        value
    }

    #[test]
    fn started_wire_shape() {
        let json = to_json(&EventEnvelope::new(make_key(), CardEvent::Started));
        assert_eq!(json["key"], "en|es|noun|run");
        assert_eq!(json["type"], "started");
        assert!(json.get("stage").is_none());
        assert!(json.get("data").is_none());
        assert!(json.get("reason").is_none());
        assert!(json["ts"].is_string());
    }

    #[test]
    fn stage_update_wire_shape() {
        let event = CardEvent::StageUpdate {
            stage: "audio".to_string(),
            data: serde_json::json!({"url": "s3://cards/run.mp3"}),
        };
        let json = to_json(&EventEnvelope::new(make_key(), event));
        assert_eq!(json["type"], "stage_update");
        assert_eq!(json["stage"], "audio");
        assert_eq!(json["data"]["url"], "s3://cards/run.mp3");
    }

    #[test]
    fn completed_result_serializes_as_data() {
        let event = CardEvent::Completed {
            result: serde_json::json!({"translation": "correr"}),
        };
        let json = to_json(&EventEnvelope::new(make_key(), event));
        assert_eq!(json["type"], "completed");
        assert_eq!(json["data"]["translation"], "correr");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn cache_hit_result_serializes_as_data() {
        let event = CardEvent::CacheHit {
            result: serde_json::json!({"translation": "correr"}),
        };
        let json = to_json(&EventEnvelope::new(make_key(), event));
        assert_eq!(json["type"], "cache_hit");
        assert_eq!(json["data"]["translation"], "correr");
    }

    #[test]
    fn failed_carries_reason() {
        let event = CardEvent::Failed {
            reason: "tts provider unreachable".to_string(),
        };
        let json = to_json(&EventEnvelope::new(make_key(), event));
        assert_eq!(json["type"], "failed");
        assert_eq!(json["reason"], "tts provider unreachable");
    }

    #[test]
    fn kind_matches_wire_type() {
        assert_eq!(CardEvent::Started.kind(), "started");
        let event = CardEvent::Failed {
            reason: String::new(),
        };
        assert_eq!(event.kind(), "failed");
    }

    #[test]
    fn terminal_classification() {
        assert!(!CardEvent::Started.is_terminal());
        let stage = CardEvent::StageUpdate {
            stage: "image".to_string(),
            data: serde_json::Value::Null,
        };
        assert!(!stage.is_terminal());
        let done = CardEvent::Completed {
            result: serde_json::Value::Null,
        };
        assert!(done.is_terminal());
        let hit = CardEvent::CacheHit {
            result: serde_json::Value::Null,
        };
        assert!(hit.is_terminal());
        let failed = CardEvent::Failed {
            reason: String::new(),
        };
        assert!(failed.is_terminal());
    }

    #[test]
    fn envelope_round_trips() {
        let event = CardEvent::StageUpdate {
            stage: "translation".to_string(),
            data: serde_json::json!({"text": "correr"}),
        };
        let envelope = EventEnvelope::new(make_key(), event);
        let Ok(json) = serde_json::to_string(&envelope) else {
            panic!("serialization failed");
        };
        let Ok(back) = serde_json::from_str::<EventEnvelope>(&json) else {
            panic!("deserialization failed");
        };
        assert_eq!(back.key, envelope.key);
        assert_eq!(back.event.kind(), "stage_update");
    }
}
