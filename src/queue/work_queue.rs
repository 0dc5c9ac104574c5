//! Ordered in-process work queue with per-key lanes.
//!
//! Jobs for the same card key serialize: a key's lane delivers at most
//! one job at a time, and the next job is only deliverable after the
//! current one is acked, nacked, or reclaimed by the visibility sweep.
//! Jobs for different keys deliver independently in global FIFO order.
//!
//! All lane state lives under a single mutex, and the conditional
//! create (`enqueue_if_absent`) runs under that same mutex. There is no
//! separate "is this key busy" map anywhere else in the crate, so the
//! at-most-one-active-job-per-key invariant cannot split-brain.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use super::dead_letter::{DeadLetterChannel, DeadLetterEntry};
use crate::domain::{CardKey, Job, JobId, JobStatus};
use crate::error::LexicastError;

/// Outcome of the conditional create.
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// No active job existed for the key; a fresh one was created.
    Created(Job),
    /// The key already has a non-terminal job; its ID is returned so
    /// the caller can attach to it.
    Existing(JobId),
}

/// A job that has been delivered to a worker and not yet released.
#[derive(Debug, Clone)]
struct InFlightJob {
    job: Job,
    /// Past this instant the delivery is considered lost and the
    /// visibility sweep dead-letters the job.
    deadline: DateTime<Utc>,
}

/// Per-key lane: one optional in-flight job plus the jobs waiting
/// behind it in arrival order.
#[derive(Debug, Default)]
struct KeyLane {
    in_flight: Option<InFlightJob>,
    waiting: VecDeque<Job>,
}

impl KeyLane {
    fn is_empty(&self) -> bool {
        self.in_flight.is_none() && self.waiting.is_empty()
    }
}

/// All queue state behind one lock.
#[derive(Debug, Default)]
struct QueueState {
    lanes: HashMap<CardKey, KeyLane>,
    /// Keys whose lane head is deliverable, in FIFO order.
    ready: VecDeque<CardKey>,
    /// In-flight job ID to lane key, for `ack`/`nack` by ID.
    in_flight_index: HashMap<JobId, CardKey>,
    closed: bool,
}

/// Lock-serialized work queue with per-key delivery ordering.
#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    visibility: chrono::Duration,
    dead_letters: Arc<DeadLetterChannel>,
}

impl WorkQueue {
    /// Creates a queue.
    ///
    /// `visibility_timeout_secs` bounds how long a delivered job may go
    /// unacked before the sweep reclaims it; it should be several times
    /// the expected worst-case pipeline latency.
    #[must_use]
    pub fn new(visibility_timeout_secs: u64, dead_letters: Arc<DeadLetterChannel>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            visibility: chrono::Duration::seconds(
                i64::try_from(visibility_timeout_secs).unwrap_or(i64::MAX),
            ),
            dead_letters,
        }
    }

    /// The dead-letter channel this queue feeds.
    #[must_use]
    pub fn dead_letters(&self) -> &Arc<DeadLetterChannel> {
        &self.dead_letters
    }

    /// Creates a pending job for `key` unless the key already has a
    /// non-terminal job.
    ///
    /// This is the only write path that creates jobs. The existence
    /// check and the insert happen under one lock acquisition, so two
    /// concurrent calls for the same key produce exactly one job.
    ///
    /// # Errors
    ///
    /// Returns [`LexicastError::QueueClosed`] after [`close`](Self::close).
    pub async fn enqueue_if_absent(&self, key: &CardKey) -> Result<EnqueueOutcome, LexicastError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LexicastError::QueueClosed);
        }

        if let Some(lane) = state.lanes.get(key) {
            if let Some(in_flight) = &lane.in_flight {
                return Ok(EnqueueOutcome::Existing(in_flight.job.id));
            }
            if let Some(head) = lane.waiting.front() {
                return Ok(EnqueueOutcome::Existing(head.id));
            }
        }

        let job = Job::new(key.clone());
        state
            .lanes
            .entry(key.clone())
            .or_default()
            .waiting
            .push_back(job.clone());
        state.ready.push_back(key.clone());
        tracing::debug!(job_id = %job.id, key = %key, "job enqueued");
        self.notify.notify_one();
        Ok(EnqueueOutcome::Created(job))
    }

    /// Awaits the next deliverable job.
    ///
    /// The returned job is marked `InFlight` with a visibility deadline;
    /// its lane delivers nothing further until `ack`, `nack`, or the
    /// visibility sweep releases it. Returns `None` once the queue is
    /// closed and drained.
    pub async fn recv(&self) -> Option<Job> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(job) = self.pop_ready(&mut state) {
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Pops the next ready lane head and marks it in flight.
    fn pop_ready(&self, state: &mut QueueState) -> Option<Job> {
        while let Some(key) = state.ready.pop_front() {
            let Some(lane) = state.lanes.get_mut(&key) else {
                continue;
            };
            if lane.in_flight.is_some() {
                continue;
            }
            let Some(mut job) = lane.waiting.pop_front() else {
                continue;
            };
            job.status = JobStatus::InFlight;
            lane.in_flight = Some(InFlightJob {
                job: job.clone(),
                deadline: Utc::now() + self.visibility,
            });
            state.in_flight_index.insert(job.id, key);
            return Some(job);
        }
        None
    }

    /// Finalizes a delivered job as done and releases its lane.
    ///
    /// Returns `false` for a stale acknowledgement: an unknown ID, or a
    /// job the visibility sweep already reclaimed. Stale acks are
    /// harmless no-ops.
    pub async fn ack(&self, job_id: JobId) -> bool {
        let mut state = self.state.lock().await;
        let Some(key) = state.in_flight_index.remove(&job_id) else {
            return false;
        };
        let cleared = match state.lanes.get_mut(&key) {
            Some(lane) if lane.in_flight.as_ref().is_some_and(|i| i.job.id == job_id) => {
                lane.in_flight = None;
                true
            }
            _ => false,
        };
        if cleared {
            tracing::debug!(job_id = %job_id, key = %key, "job acked");
            self.release_lane(&mut state, &key);
        }
        cleared
    }

    /// Dead-letters a delivered job and releases its lane.
    ///
    /// There is no automatic retry: the job's single delivery attempt
    /// is spent, and only the operator requeue path can try again.
    /// Returns `false` for stale nacks, like [`ack`](Self::ack).
    pub async fn nack(&self, job_id: JobId, reason: &str) -> bool {
        let entry = {
            let mut state = self.state.lock().await;
            let Some(key) = state.in_flight_index.remove(&job_id) else {
                return false;
            };
            let taken = match state.lanes.get_mut(&key) {
                Some(lane) if lane.in_flight.as_ref().is_some_and(|i| i.job.id == job_id) => {
                    lane.in_flight.take()
                }
                _ => None,
            };
            let Some(in_flight) = taken else {
                return false;
            };
            self.release_lane(&mut state, &key);
            let mut job = in_flight.job;
            job.status = JobStatus::Failed;
            DeadLetterEntry {
                job,
                reason: reason.to_string(),
                failed_at: Utc::now(),
            }
        };
        self.dead_letters.push(entry).await;
        true
    }

    /// Dead-letters every in-flight job past its visibility deadline.
    ///
    /// An overdue delivery means the worker died or wedged mid-job;
    /// the job is failed, never silently redelivered. Returns the
    /// reclaimed jobs.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Vec<Job> {
        let entries = {
            let mut state = self.state.lock().await;
            let overdue: Vec<CardKey> = state
                .lanes
                .iter()
                .filter(|(_, lane)| {
                    lane.in_flight.as_ref().is_some_and(|i| i.deadline <= now)
                })
                .map(|(key, _)| key.clone())
                .collect();

            let mut entries = Vec::with_capacity(overdue.len());
            for key in overdue {
                let taken = state.lanes.get_mut(&key).and_then(|lane| lane.in_flight.take());
                let Some(in_flight) = taken else {
                    continue;
                };
                state.in_flight_index.remove(&in_flight.job.id);
                self.release_lane(&mut state, &key);
                let mut job = in_flight.job;
                job.status = JobStatus::Failed;
                tracing::warn!(
                    job_id = %job.id,
                    key = %key,
                    "visibility timeout elapsed, reclaiming job"
                );
                entries.push(DeadLetterEntry {
                    job,
                    reason: "visibility timeout elapsed".to_string(),
                    failed_at: now,
                });
            }
            entries
        };

        let mut expired = Vec::with_capacity(entries.len());
        for entry in entries {
            expired.push(entry.job.clone());
            self.dead_letters.push(entry).await;
        }
        expired
    }

    /// Promotes the lane's next waiting job (if any) and drops empty
    /// lanes. Caller must hold the state lock.
    fn release_lane(&self, state: &mut QueueState, key: &CardKey) {
        let Some(lane) = state.lanes.get_mut(key) else {
            return;
        };
        if lane.is_empty() {
            state.lanes.remove(key);
            return;
        }
        if lane.in_flight.is_none() && !lane.waiting.is_empty() {
            state.ready.push_back(key.clone());
            self.notify.notify_one();
        }
    }

    /// Closes the queue: wakes all `recv` waiters, which drain the
    /// remaining ready jobs and then return `None`.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.closed = true;
        self.notify.notify_waiters();
    }

    /// Number of jobs waiting for delivery.
    pub async fn pending_count(&self) -> usize {
        let state = self.state.lock().await;
        state.lanes.values().map(|lane| lane.waiting.len()).sum()
    }

    /// Number of jobs currently delivered and unreleased.
    pub async fn in_flight_count(&self) -> usize {
        self.state.lock().await.in_flight_index.len()
    }

    /// Number of keys with an active lane.
    pub async fn lane_count(&self) -> usize {
        self.state.lock().await.lanes.len()
    }
}

/// Spawns the periodic visibility sweep as a background task.
///
/// Runs [`WorkQueue::expire_overdue`] every `interval_secs` seconds
/// until the process exits.
pub fn spawn_visibility_sweep(
    queue: Arc<WorkQueue>,
    interval_secs: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let expired = queue.expire_overdue(Utc::now()).await;
            if !expired.is_empty() {
                tracing::warn!(count = expired.len(), "visibility sweep reclaimed jobs");
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn make_queue(visibility_secs: u64) -> WorkQueue {
        WorkQueue::new(visibility_secs, Arc::new(DeadLetterChannel::new(16)))
    }

    fn make_key(term: &str) -> CardKey {
        let Ok(key) = CardKey::new("en", "es", "noun", term) else {
            panic!("valid key");
        };
        key
    }

    #[tokio::test]
    async fn conditional_create_attaches_to_existing() {
        let queue = make_queue(300);
        let key = make_key("run");

        let Ok(EnqueueOutcome::Created(job)) = queue.enqueue_if_absent(&key).await else {
            panic!("first enqueue should create");
        };
        let Ok(EnqueueOutcome::Existing(existing_id)) = queue.enqueue_if_absent(&key).await
        else {
            panic!("second enqueue should attach");
        };
        assert_eq!(existing_id, job.id);
        assert_eq!(queue.pending_count().await, 1);
    }

    #[tokio::test]
    async fn recv_marks_in_flight() {
        let queue = make_queue(300);
        let key = make_key("run");
        let _ = queue.enqueue_if_absent(&key).await;

        let Some(job) = queue.recv().await else {
            panic!("job should be deliverable");
        };
        assert_eq!(job.status, JobStatus::InFlight);
        assert_eq!(queue.pending_count().await, 0);
        assert_eq!(queue.in_flight_count().await, 1);
    }

    #[tokio::test]
    async fn ack_releases_the_key() {
        let queue = make_queue(300);
        let key = make_key("run");
        let _ = queue.enqueue_if_absent(&key).await;
        let Some(job) = queue.recv().await else {
            panic!("job should be deliverable");
        };

        assert!(queue.ack(job.id).await);
        assert_eq!(queue.in_flight_count().await, 0);
        assert_eq!(queue.lane_count().await, 0);

        // The key is free again: a new admission creates a fresh job.
        let Ok(EnqueueOutcome::Created(next)) = queue.enqueue_if_absent(&key).await else {
            panic!("released key should accept a new job");
        };
        assert_ne!(next.id, job.id);
    }

    #[tokio::test]
    async fn stale_ack_is_a_noop() {
        let queue = make_queue(300);
        assert!(!queue.ack(JobId::new()).await);
    }

    #[tokio::test]
    async fn nack_dead_letters_without_retry() {
        let queue = make_queue(300);
        let key = make_key("run");
        let _ = queue.enqueue_if_absent(&key).await;
        let Some(job) = queue.recv().await else {
            panic!("job should be deliverable");
        };

        assert!(queue.nack(job.id, "pipeline exploded").await);

        let entries = queue.dead_letters().entries().await;
        assert_eq!(entries.len(), 1);
        let Some(entry) = entries.first() else {
            panic!("dead letter should exist");
        };
        assert_eq!(entry.job.id, job.id);
        assert_eq!(entry.job.status, JobStatus::Failed);
        assert_eq!(entry.reason, "pipeline exploded");

        // No automatic retry: nothing is deliverable.
        assert_eq!(queue.pending_count().await, 0);
        assert_eq!(queue.in_flight_count().await, 0);
    }

    #[tokio::test]
    async fn same_key_never_delivers_twice_concurrently() {
        let queue = make_queue(300);
        let key = make_key("run");
        let _ = queue.enqueue_if_absent(&key).await;

        let Some(first) = queue.recv().await else {
            panic!("job should be deliverable");
        };

        // While the first job is in flight the key attaches, and the
        // queue has nothing to deliver.
        let Ok(EnqueueOutcome::Existing(_)) = queue.enqueue_if_absent(&key).await else {
            panic!("in-flight key should attach");
        };
        let second_recv =
            tokio::time::timeout(std::time::Duration::from_millis(50), queue.recv()).await;
        assert!(second_recv.is_err(), "no job should be deliverable");

        // After ack the key accepts and delivers a new job.
        assert!(queue.ack(first.id).await);
        let Ok(EnqueueOutcome::Created(_)) = queue.enqueue_if_absent(&key).await else {
            panic!("released key should accept a new job");
        };
        let Some(second) = queue.recv().await else {
            panic!("new job should be deliverable");
        };
        assert_ne!(second.id, first.id);
    }

    #[tokio::test]
    async fn distinct_keys_deliver_in_fifo_order() {
        let queue = make_queue(300);
        let keys = ["one", "two", "three"].map(make_key);
        for key in &keys {
            let _ = queue.enqueue_if_absent(key).await;
        }

        for expected in &keys {
            let Some(job) = queue.recv().await else {
                panic!("job should be deliverable");
            };
            assert_eq!(&job.key, expected);
        }
    }

    #[tokio::test]
    async fn overdue_delivery_is_dead_lettered() {
        let queue = make_queue(0);
        let key = make_key("run");
        let _ = queue.enqueue_if_absent(&key).await;
        let Some(job) = queue.recv().await else {
            panic!("job should be deliverable");
        };

        let expired = queue.expire_overdue(Utc::now()).await;
        assert_eq!(expired.len(), 1);
        let Some(reclaimed) = expired.first() else {
            panic!("expired job should exist");
        };
        assert_eq!(reclaimed.id, job.id);
        assert_eq!(reclaimed.status, JobStatus::Failed);

        // The late ack from the wedged worker is a no-op.
        assert!(!queue.ack(job.id).await);

        let entries = queue.dead_letters().entries().await;
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn fresh_delivery_is_not_reclaimed() {
        let queue = make_queue(300);
        let key = make_key("run");
        let _ = queue.enqueue_if_absent(&key).await;
        let Some(_job) = queue.recv().await else {
            panic!("job should be deliverable");
        };

        let expired = queue.expire_overdue(Utc::now()).await;
        assert!(expired.is_empty());
        assert_eq!(queue.in_flight_count().await, 1);
    }

    #[tokio::test]
    async fn close_unblocks_recv() {
        let queue = Arc::new(make_queue(300));
        let recv_task = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.recv().await })
        };

        queue.close().await;

        let Ok(received) = recv_task.await else {
            panic!("recv task should join");
        };
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn closed_queue_rejects_enqueue() {
        let queue = make_queue(300);
        queue.close().await;
        let result = queue.enqueue_if_absent(&make_key("run")).await;
        assert!(matches!(result, Err(LexicastError::QueueClosed)));
    }
}
