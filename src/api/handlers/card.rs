//! Card handlers: submit a generation request, poll for a result.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::admission::Admission;
use crate::api::dto::{CardResultResponse, SubmitCardRequest, SubmitCardResponse};
use crate::app_state::AppState;
use crate::domain::{CardKey, ConnectionId};
use crate::error::{ErrorResponse, LexicastError};

/// `POST /cards` — Request a vocabulary card.
///
/// # Errors
///
/// Returns [`LexicastError::InvalidKey`] when the key segments do not
/// normalize to a valid key, or [`LexicastError::ConnectionNotFound`]
/// when `connection_id` is not a live push connection.
#[utoipa::path(
    post,
    path = "/api/v1/cards",
    tag = "Cards",
    summary = "Request a vocabulary card",
    description = "Normalizes the request into a card key and admits it: returns the \
                   finished card if one exists, attaches to the key's running job if \
                   there is one, or enqueues a new generation job. Progress events \
                   arrive on the caller's WebSocket connection.",
    request_body = SubmitCardRequest,
    responses(
        (status = 200, description = "Cache hit or attached to a running job", body = SubmitCardResponse),
        (status = 202, description = "New generation job enqueued", body = SubmitCardResponse),
        (status = 400, description = "Invalid key segments", body = ErrorResponse),
        (status = 404, description = "Unknown connection", body = ErrorResponse),
    )
)]
pub async fn submit_card(
    State(state): State<AppState>,
    Json(req): Json<SubmitCardRequest>,
) -> Result<impl IntoResponse, LexicastError> {
    let key = CardKey::new(&req.source_lang, &req.target_lang, &req.pos, &req.term)?;
    let requester = ConnectionId::from_uuid(req.connection_id);

    let admission = state.admission.admit(&key, requester).await?;
    let (status_code, job_id, result) = match &admission {
        Admission::CacheHit(result) => (StatusCode::OK, None, Some(result.clone())),
        Admission::Attached(job_id) => (StatusCode::OK, Some(*job_id.as_uuid()), None),
        Admission::Enqueued(job_id) => (StatusCode::ACCEPTED, Some(*job_id.as_uuid()), None),
    };

    let response = SubmitCardResponse {
        status: admission.status().to_string(),
        key: key.to_string(),
        job_id,
        result,
    };

    Ok((status_code, Json(response)))
}

/// `GET /cards/:key` — Fetch a finished card.
///
/// The fallback for subscribers that missed their push events: the
/// result store is the source of truth for outcomes.
///
/// # Errors
///
/// Returns [`LexicastError::InvalidKey`] for a malformed key and
/// [`LexicastError::ResultNotFound`] when no finished card exists.
#[utoipa::path(
    get,
    path = "/api/v1/cards/{key}",
    tag = "Cards",
    summary = "Fetch a finished card",
    description = "Looks up the finished card for a canonical key, e.g. `en|es|noun|run`.",
    params(
        ("key" = String, Path, description = "Canonical card key"),
    ),
    responses(
        (status = 200, description = "The finished card", body = CardResultResponse),
        (status = 400, description = "Malformed key", body = ErrorResponse),
        (status = 404, description = "No finished card for this key", body = ErrorResponse),
    )
)]
pub async fn get_card(
    State(state): State<AppState>,
    Path(raw_key): Path<String>,
) -> Result<impl IntoResponse, LexicastError> {
    let key = CardKey::parse(&raw_key)?;
    let Some(result) = state.result_store.get(&key).await? else {
        return Err(LexicastError::ResultNotFound(key.to_string()));
    };

    Ok(Json(CardResultResponse {
        key: key.to_string(),
        result,
    }))
}

/// Card routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cards", post(submit_card))
        .route("/cards/{key}", get(get_card))
}
