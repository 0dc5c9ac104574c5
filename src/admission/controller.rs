//! Admission controller: the single decision point for new work.
//!
//! Every request funnels through [`AdmissionController::admit`], which
//! decides between three outcomes in strict order: finished result in
//! the store (cache hit, no job), live job for the key (attach, no new
//! job), or neither (create exactly one job). The create is the
//! queue's conditional insert, so concurrent admissions for one key
//! can never race a duplicate job into existence.

use std::sync::Arc;

use crate::broadcast::{PushTransport, SendOutcome};
use crate::domain::{CardEvent, CardKey, ConnectionId, EventEnvelope, JobId};
use crate::error::LexicastError;
use crate::persistence::ResultStore;
use crate::queue::{EnqueueOutcome, WorkQueue};
use crate::registry::ConnectionRegistry;

/// Outcome of admitting a card request.
#[derive(Debug, Clone)]
pub enum Admission {
    /// The card already exists; the payload was pushed to the requester
    /// and is also returned inline.
    CacheHit(serde_json::Value),
    /// A job for this key is already active; the requester was attached
    /// to it.
    Attached(JobId),
    /// No active job existed; a new one was created.
    Enqueued(JobId),
}

impl Admission {
    /// Wire label for the REST response.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::CacheHit(_) => "cache_hit",
            Self::Attached(_) => "attached",
            Self::Enqueued(_) => "enqueued",
        }
    }
}

/// Admits card requests against the result store and the work queue.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    registry: ConnectionRegistry,
    queue: Arc<WorkQueue>,
    result_store: Arc<dyn ResultStore>,
    transport: Arc<dyn PushTransport>,
}

impl AdmissionController {
    /// Creates a controller.
    #[must_use]
    pub fn new(
        registry: ConnectionRegistry,
        queue: Arc<WorkQueue>,
        result_store: Arc<dyn ResultStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            registry,
            queue,
            result_store,
            transport,
        }
    }

    /// Admits a request for `key` on behalf of `requester`.
    ///
    /// The requester is subscribed to the key in every branch, so it
    /// receives whatever events the key produces later. On a cache hit
    /// one `cache_hit` envelope is pushed directly to the requester
    /// alone; nothing is enqueued and no other subscriber hears about
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::ConnectionNotFound`] when the requester
    /// is not a registered connection, [`LexicastError::QueueClosed`]
    /// during shutdown, or a [`LexicastError::PersistenceError`] from
    /// the stores.
    pub async fn admit(
        &self,
        key: &CardKey,
        requester: ConnectionId,
    ) -> Result<Admission, LexicastError> {
        // Cache check comes first: a finished card never creates a job.
        if let Some(result) = self.result_store.get(key).await? {
            self.registry.subscribe(requester, key).await?;
            self.push_cache_hit(key, requester, result.clone()).await;
            tracing::info!(key = %key, conn_id = %requester, "admission cache hit");
            return Ok(Admission::CacheHit(result));
        }

        self.registry.subscribe(requester, key).await?;

        match self.queue.enqueue_if_absent(key).await? {
            EnqueueOutcome::Created(job) => {
                tracing::info!(key = %key, job_id = %job.id, conn_id = %requester, "admission enqueued new job");
                Ok(Admission::Enqueued(job.id))
            }
            EnqueueOutcome::Existing(job_id) => {
                tracing::info!(key = %key, job_id = %job_id, conn_id = %requester, "admission attached to active job");
                Ok(Admission::Attached(job_id))
            }
        }
    }

    /// Pushes the `cache_hit` envelope to the requester only.
    ///
    /// This is a direct send, not a broadcast: other subscribers of the
    /// key asked for a generation run, not a replay of its result.
    async fn push_cache_hit(
        &self,
        key: &CardKey,
        requester: ConnectionId,
        result: serde_json::Value,
    ) {
        let envelope = EventEnvelope::new(key.clone(), CardEvent::CacheHit { result });
        match self.transport.send(requester, &envelope).await {
            SendOutcome::Delivered => {}
            SendOutcome::Gone => {
                if let Err(e) = self.registry.prune(requester).await {
                    tracing::warn!(conn_id = %requester, error = %e, "prune failed");
                }
            }
            SendOutcome::Transient(reason) => {
                tracing::warn!(
                    conn_id = %requester,
                    key = %key,
                    reason = %reason,
                    "cache hit push failed"
                );
            }
        }
    }
}
