//! Dead-letter handlers: the operator's view of failed jobs.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{DeadLetterDto, DeadLetterListResponse, RequeueResponse};
use crate::app_state::AppState;
use crate::domain::JobId;
use crate::error::{ErrorResponse, LexicastError};
use crate::queue::EnqueueOutcome;

/// `GET /dead-letters` — List dead-lettered jobs.
#[utoipa::path(
    get,
    path = "/api/v1/dead-letters",
    tag = "DeadLetters",
    summary = "List dead-lettered jobs",
    description = "Returns every job whose single delivery attempt failed, oldest first. \
                   Entries leave this list only via requeue or ring eviction.",
    responses(
        (status = 200, description = "Dead-letter entries", body = DeadLetterListResponse),
    )
)]
pub async fn list_dead_letters(State(state): State<AppState>) -> impl IntoResponse {
    let entries = state.queue.dead_letters().entries().await;
    let data: Vec<DeadLetterDto> = entries
        .into_iter()
        .map(|entry| DeadLetterDto {
            job_id: *entry.job.id.as_uuid(),
            key: entry.job.key.to_string(),
            reason: entry.reason,
            enqueued_at: entry.job.enqueued_at,
            failed_at: entry.failed_at,
        })
        .collect();
    let total = data.len();

    Json(DeadLetterListResponse { data, total })
}

/// `POST /dead-letters/:job_id/requeue` — Retry a failed job.
///
/// Retry is an explicit operator decision; the queue never does this
/// on its own. The entry is consumed and a fresh job goes through the
/// same conditional create as a normal admission.
///
/// # Errors
///
/// Returns [`LexicastError::JobNotFound`] when no dead-letter entry
/// exists for the ID, or [`LexicastError::QueueClosed`] during
/// shutdown.
#[utoipa::path(
    post,
    path = "/api/v1/dead-letters/{job_id}/requeue",
    tag = "DeadLetters",
    summary = "Requeue a dead-lettered job",
    description = "Removes the entry and enqueues a fresh job for its key. If the key \
                   already has an active job again, the entry is still consumed and the \
                   response points at that job.",
    params(
        ("job_id" = uuid::Uuid, Path, description = "Dead-lettered job UUID"),
    ),
    responses(
        (status = 202, description = "Job requeued", body = RequeueResponse),
        (status = 404, description = "No dead-letter entry for this ID", body = ErrorResponse),
    )
)]
pub async fn requeue_dead_letter(
    State(state): State<AppState>,
    Path(job_id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, LexicastError> {
    let job_id = JobId::from_uuid(job_id);
    let Some(entry) = state.queue.dead_letters().take(job_id).await else {
        return Err(LexicastError::JobNotFound(*job_id.as_uuid()));
    };

    let key = entry.job.key;
    let (status, new_job_id) = match state.queue.enqueue_if_absent(&key).await? {
        EnqueueOutcome::Created(job) => ("requeued", job.id),
        EnqueueOutcome::Existing(active_id) => ("attached", active_id),
    };
    tracing::info!(
        old_job_id = %job_id,
        job_id = %new_job_id,
        key = %key,
        status,
        "dead-letter requeue"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(RequeueResponse {
            status: status.to_string(),
            key: key.to_string(),
            job_id: *new_job_id.as_uuid(),
        }),
    ))
}

/// Dead-letter routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dead-letters", get(list_dead_letters))
        .route("/dead-letters/{job_id}/requeue", post(requeue_dead_letter))
}
