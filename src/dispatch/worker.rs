//! Worker dispatcher: drives the pipeline and reports its events.
//!
//! Each worker loops `recv → process`. Processing publishes `started`,
//! relays every pipeline stage as a `stage_update`, and finishes with
//! exactly one terminal event per job: `completed` (result stored,
//! job acked) or `failed` (job nacked to the dead-letter channel).
//! All publishing goes through the [`EventForwarder`], so a slow
//! fan-out can never stall a pipeline run.

use std::sync::Arc;

use futures_util::StreamExt;

use super::pipeline::{CardPipeline, PipelineEvent};
use crate::broadcast::EventForwarder;
use crate::domain::{CardEvent, EventEnvelope, Job};
use crate::persistence::ResultStore;
use crate::queue::WorkQueue;

/// One queue consumer.
#[derive(Debug)]
pub struct Worker {
    id: usize,
    queue: Arc<WorkQueue>,
    pipeline: Arc<dyn CardPipeline>,
    result_store: Arc<dyn ResultStore>,
    forwarder: EventForwarder,
}

impl Worker {
    /// Creates a worker.
    #[must_use]
    pub fn new(
        id: usize,
        queue: Arc<WorkQueue>,
        pipeline: Arc<dyn CardPipeline>,
        result_store: Arc<dyn ResultStore>,
        forwarder: EventForwarder,
    ) -> Self {
        Self {
            id,
            queue,
            pipeline,
            result_store,
            forwarder,
        }
    }

    /// Consumes jobs until the queue closes.
    pub async fn run(self) {
        tracing::info!(worker = self.id, "worker started");
        while let Some(job) = self.queue.recv().await {
            self.process(job).await;
        }
        tracing::info!(worker = self.id, "worker stopped");
    }

    /// Runs one job's pipeline to its end.
    async fn process(&self, job: Job) {
        tracing::info!(worker = self.id, job_id = %job.id, key = %job.key, "processing job");
        self.forwarder
            .forward(EventEnvelope::new(job.key.clone(), CardEvent::Started));

        let mut stream = self.pipeline.generate(&job.key);
        let mut terminal_sent = false;
        while let Some(event) = stream.next().await {
            if terminal_sent {
                // The pipeline contract is one terminal item; anything
                // after it must not produce a second terminal event.
                tracing::warn!(
                    worker = self.id,
                    job_id = %job.id,
                    "pipeline item after terminal, discarding"
                );
                continue;
            }
            match event {
                PipelineEvent::Stage { stage, data } => {
                    tracing::debug!(
                        worker = self.id,
                        job_id = %job.id,
                        stage = %stage,
                        "pipeline stage finished"
                    );
                    self.forwarder.forward(EventEnvelope::new(
                        job.key.clone(),
                        CardEvent::StageUpdate {
                            stage,
                            data: data.unwrap_or(serde_json::Value::Null),
                        },
                    ));
                }
                PipelineEvent::Completed { result } => {
                    terminal_sent = true;
                    self.finish_success(&job, result).await;
                }
                PipelineEvent::Failed { reason } => {
                    terminal_sent = true;
                    self.finish_failure(&job, &reason).await;
                }
            }
        }

        if !terminal_sent {
            // A bare stream end is a pipeline bug; treat it as failure
            // so subscribers are not left waiting forever.
            self.finish_failure(&job, "pipeline ended without a terminal event")
                .await;
        }
    }

    /// Stores the result, acks, then publishes `completed`.
    ///
    /// The store write strictly precedes the ack, so once the queue
    /// frees the key a new admission for it is guaranteed to see the
    /// cached result.
    async fn finish_success(&self, job: &Job, result: serde_json::Value) {
        if let Err(e) = self.result_store.put(&job.key, result.clone()).await {
            tracing::error!(
                worker = self.id,
                job_id = %job.id,
                key = %job.key,
                error = %e,
                "result store write failed"
            );
            self.finish_failure(job, &format!("result store failure: {e}"))
                .await;
            return;
        }

        if !self.queue.ack(job.id).await {
            // The visibility sweep reclaimed this job mid-run. The
            // result is stored and subscribers still get their
            // terminal event; the dead-letter entry is the operator's
            // signal that the timeout is set too tight.
            tracing::warn!(
                worker = self.id,
                job_id = %job.id,
                "ack was stale, job was reclaimed while processing"
            );
        }

        self.forwarder.forward(EventEnvelope::new(
            job.key.clone(),
            CardEvent::Completed { result },
        ));
        tracing::info!(worker = self.id, job_id = %job.id, key = %job.key, "job completed");
    }

    /// Publishes `failed`, then nacks into the dead-letter channel.
    async fn finish_failure(&self, job: &Job, reason: &str) {
        self.forwarder.forward(EventEnvelope::new(
            job.key.clone(),
            CardEvent::Failed {
                reason: reason.to_string(),
            },
        ));
        if !self.queue.nack(job.id, reason).await {
            tracing::warn!(
                worker = self.id,
                job_id = %job.id,
                "nack was stale, job was reclaimed while processing"
            );
        }
        tracing::warn!(
            worker = self.id,
            job_id = %job.id,
            key = %job.key,
            reason = %reason,
            "job failed"
        );
    }
}

/// Spawns `count` independent workers over the same queue.
///
/// Per-key serialization needs no coordination here: the queue never
/// makes two jobs for one key deliverable at once.
pub fn spawn_workers(
    count: usize,
    queue: &Arc<WorkQueue>,
    pipeline: &Arc<dyn CardPipeline>,
    result_store: &Arc<dyn ResultStore>,
    forwarder: &EventForwarder,
) -> Vec<tokio::task::JoinHandle<()>> {
    (0..count)
        .map(|id| {
            let worker = Worker::new(
                id,
                Arc::clone(queue),
                Arc::clone(pipeline),
                Arc::clone(result_store),
                forwarder.clone(),
            );
            tokio::spawn(worker.run())
        })
        .collect()
}
