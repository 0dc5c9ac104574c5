//! Card generation pipeline seam.
//!
//! The pipeline is a black box from the dispatcher's point of view: it
//! takes a card key and yields an ordered, finite stream of events
//! terminated by exactly one `Completed` or `Failed`. It is never
//! restarted mid-stream. The [`StubPipeline`] stands in when no real
//! generator is wired and in tests.

use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use crate::domain::CardKey;

/// One item of a pipeline's event stream.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A named intermediate stage finished, optionally with a partial
    /// payload (e.g. the translation while audio is still rendering).
    Stage {
        /// Stage name, e.g. `translation`.
        stage: String,
        /// Partial payload for the stage, if any.
        data: Option<serde_json::Value>,
    },
    /// Terminal success with the finished card.
    Completed {
        /// The complete card payload.
        result: serde_json::Value,
    },
    /// Terminal failure.
    Failed {
        /// Human-readable failure reason.
        reason: String,
    },
}

/// Generates a card for a key as a stream of events.
pub trait CardPipeline: Send + Sync + std::fmt::Debug {
    /// Starts one generation run.
    ///
    /// The returned stream owns everything it needs; the dispatcher
    /// consumes it to the end exactly once.
    fn generate(&self, key: &CardKey) -> BoxStream<'static, PipelineEvent>;
}

/// The stages the stub emits, in order.
const STUB_STAGES: [&str; 4] = ["translation", "examples", "audio", "image"];

/// Built-in development pipeline.
///
/// Emits the standard card stages with a configurable delay between
/// items, then completes with a placeholder card assembled from the
/// key. Deterministic, so tests can assert exact event sequences.
#[derive(Debug, Clone)]
pub struct StubPipeline {
    stage_delay: std::time::Duration,
}

impl StubPipeline {
    /// Creates a stub with `stage_delay_ms` between emitted items.
    #[must_use]
    pub fn new(stage_delay_ms: u64) -> Self {
        Self {
            stage_delay: std::time::Duration::from_millis(stage_delay_ms),
        }
    }

    fn placeholder_card(key: &CardKey) -> serde_json::Value {
        serde_json::json!({
            "source_lang": key.source_lang(),
            "target_lang": key.target_lang(),
            "pos": key.pos(),
            "term": key.term(),
            "translation": format!("[{}] {}", key.target_lang(), key.term()),
            "examples": [
                format!("Example sentence using \"{}\".", key.term()),
            ],
            "audio_url": serde_json::Value::Null,
            "image_url": serde_json::Value::Null,
            "generator": "stub",
        })
    }
}

impl Default for StubPipeline {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CardPipeline for StubPipeline {
    fn generate(&self, key: &CardKey) -> BoxStream<'static, PipelineEvent> {
        let delay = self.stage_delay;
        let total = STUB_STAGES.len();
        let mut events: Vec<PipelineEvent> = STUB_STAGES
            .iter()
            .enumerate()
            .map(|(i, stage)| PipelineEvent::Stage {
                stage: (*stage).to_string(),
                data: Some(serde_json::json!({"step": i + 1, "total": total})),
            })
            .collect();
        events.push(PipelineEvent::Completed {
            result: Self::placeholder_card(key),
        });

        Box::pin(futures_util::stream::iter(events).then(move |event| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            event
        }))
    }
}
