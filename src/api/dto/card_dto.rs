//! Card-related DTOs for submit and poll operations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /cards`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitCardRequest {
    /// Source language code, e.g. `en`.
    pub source_lang: String,
    /// Target language code, e.g. `es`.
    pub target_lang: String,
    /// Part of speech, e.g. `noun`.
    pub pos: String,
    /// The term to generate a card for. Normalized server-side.
    pub term: String,
    /// The requester's push connection, from the WebSocket welcome
    /// message.
    pub connection_id: uuid::Uuid,
}

/// Response body for `POST /cards`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitCardResponse {
    /// Admission outcome: `cache_hit`, `attached`, or `enqueued`.
    pub status: String,
    /// The canonical card key the request normalized to.
    pub key: String,
    /// The job the requester is attached to; absent on a cache hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<uuid::Uuid>,
    /// The finished card; present only on a cache hit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// Response body for `GET /cards/{key}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CardResultResponse {
    /// Canonical card key.
    pub key: String,
    /// The finished card payload.
    pub result: serde_json::Value,
}
