//! Core error types with HTTP status code mapping.
//!
//! [`LexicastError`] is the central error type for the dispatch core.
//! Each variant maps to a specific HTTP status code and structured JSON
//! error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid card key: empty segment",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges below).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                |
/// |-----------|-----------------|----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request            |
/// | 2000–2999 | Not Found       | 404 Not Found              |
/// | 3000–3999 | Server          | 500 / 503                  |
#[derive(Debug, thiserror::Error)]
pub enum LexicastError {
    /// A card key segment failed normalization.
    #[error("invalid card key: {0}")]
    InvalidKey(String),

    /// The referenced connection is not registered.
    #[error("connection not found: {0}")]
    ConnectionNotFound(uuid::Uuid),

    /// No persisted result exists for the key.
    #[error("no result for key: {0}")]
    ResultNotFound(String),

    /// No job with the given ID exists (live or dead-lettered).
    #[error("job not found: {0}")]
    JobNotFound(uuid::Uuid),

    /// The work queue is shut down and no longer accepts jobs.
    #[error("work queue is closed")]
    QueueClosed,

    /// Error surfaced by the external generation pipeline.
    #[error("pipeline failure: {0}")]
    PipelineFailure(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LexicastError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidKey(_) => 1001,
            Self::ConnectionNotFound(_) => 2001,
            Self::ResultNotFound(_) => 2002,
            Self::JobNotFound(_) => 2003,
            Self::QueueClosed => 3002,
            Self::PipelineFailure(_) => 3003,
            Self::PersistenceError(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidKey(_) => StatusCode::BAD_REQUEST,
            Self::ConnectionNotFound(_) | Self::ResultNotFound(_) | Self::JobNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::QueueClosed => StatusCode::SERVICE_UNAVAILABLE,
            Self::PipelineFailure(_) | Self::PersistenceError(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for LexicastError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_400() {
        let err = LexicastError::InvalidKey("empty segment".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), 1001);
    }

    #[test]
    fn not_found_errors_map_to_404() {
        let err = LexicastError::ResultNotFound("en|es|noun|run".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let err = LexicastError::ConnectionNotFound(uuid::Uuid::new_v4());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn queue_closed_maps_to_503() {
        assert_eq!(
            LexicastError::QueueClosed.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn server_errors_map_to_500() {
        let err = LexicastError::PersistenceError("connection refused".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), 3001);
    }

    #[test]
    fn display_includes_context() {
        let err = LexicastError::InvalidKey("bad".to_string());
        assert_eq!(err.to_string(), "invalid card key: bad");
    }
}
