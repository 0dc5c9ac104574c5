//! Dead-letter channel for jobs that failed their single delivery.
//!
//! The queue never retries on its own: a nacked or visibility-expired
//! job lands here and stays until an operator requeues or discards it.
//! The channel is a bounded ring; when full, the oldest entry is
//! dropped with a warning so the channel cannot grow without bound.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::{Job, JobId};

/// One dead-lettered job with the reason it failed.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterEntry {
    /// The failed job (status `Failed`).
    pub job: Job,
    /// Human-readable failure reason.
    pub reason: String,
    /// When the job was dead-lettered.
    pub failed_at: DateTime<Utc>,
}

/// Bounded in-memory dead-letter ring.
#[derive(Debug)]
pub struct DeadLetterChannel {
    entries: Mutex<VecDeque<DeadLetterEntry>>,
    capacity: usize,
}

impl DeadLetterChannel {
    /// Creates a channel holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Records a failed job.
    ///
    /// When the ring is full the oldest entry is dropped and logged.
    pub async fn push(&self, entry: DeadLetterEntry) {
        let mut entries = self.entries.lock().await;
        if entries.len() >= self.capacity
            && let Some(dropped) = entries.pop_front()
        {
            tracing::warn!(
                job_id = %dropped.job.id,
                key = %dropped.job.key,
                "dead-letter channel full, dropping oldest entry"
            );
        }
        tracing::warn!(
            job_id = %entry.job.id,
            key = %entry.job.key,
            reason = %entry.reason,
            "job dead-lettered"
        );
        entries.push_back(entry);
    }

    /// Snapshot of all entries, oldest first.
    pub async fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }

    /// Removes and returns the entry for `job_id`, if present.
    ///
    /// Used by the operator requeue path so a job cannot be requeued
    /// twice from the same failure.
    pub async fn take(&self, job_id: JobId) -> Option<DeadLetterEntry> {
        let mut entries = self.entries.lock().await;
        let idx = entries.iter().position(|e| e.job.id == job_id)?;
        entries.remove(idx)
    }

    /// Number of entries currently held.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the channel is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{CardKey, JobStatus};

    fn make_entry(term: &str) -> DeadLetterEntry {
        let Ok(key) = CardKey::new("en", "es", "noun", term) else {
            panic!("valid key");
        };
        let mut job = Job::new(key);
        job.status = JobStatus::Failed;
        DeadLetterEntry {
            job,
            reason: "pipeline failure".to_string(),
            failed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn push_and_list() {
        let channel = DeadLetterChannel::new(8);
        let entry = make_entry("run");
        let job_id = entry.job.id;

        channel.push(entry).await;

        let entries = channel.entries().await;
        assert_eq!(entries.len(), 1);
        let Some(first) = entries.first() else {
            panic!("entry should exist");
        };
        assert_eq!(first.job.id, job_id);
        assert_eq!(first.reason, "pipeline failure");
    }

    #[tokio::test]
    async fn take_removes_entry() {
        let channel = DeadLetterChannel::new(8);
        let entry = make_entry("run");
        let job_id = entry.job.id;
        channel.push(entry).await;

        let Some(taken) = channel.take(job_id).await else {
            panic!("entry should be takeable");
        };
        assert_eq!(taken.job.id, job_id);

        // A second take for the same ID finds nothing.
        assert!(channel.take(job_id).await.is_none());
        assert!(channel.is_empty().await);
    }

    #[tokio::test]
    async fn full_ring_drops_oldest() {
        let channel = DeadLetterChannel::new(2);
        let first = make_entry("one");
        let first_id = first.job.id;
        channel.push(first).await;
        channel.push(make_entry("two")).await;
        channel.push(make_entry("three")).await;

        assert_eq!(channel.len().await, 2);
        // The oldest entry was evicted.
        assert!(channel.take(first_id).await.is_none());
    }
}
