//! Dead-letter DTOs for the operator endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// One dead-lettered job.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeadLetterDto {
    /// The failed job's ID.
    pub job_id: uuid::Uuid,
    /// Canonical card key the job was generating.
    pub key: String,
    /// Why the job failed.
    pub reason: String,
    /// When the job was originally enqueued.
    pub enqueued_at: DateTime<Utc>,
    /// When the job was dead-lettered.
    pub failed_at: DateTime<Utc>,
}

/// Response body for `GET /dead-letters`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeadLetterListResponse {
    /// Entries, oldest first.
    pub data: Vec<DeadLetterDto>,
    /// Number of entries.
    pub total: usize,
}

/// Response body for `POST /dead-letters/{job_id}/requeue`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RequeueResponse {
    /// `requeued` when a fresh job was created, `attached` when the
    /// key already had an active job again.
    pub status: String,
    /// Canonical card key.
    pub key: String,
    /// The job now covering the key.
    pub job_id: uuid::Uuid,
}
