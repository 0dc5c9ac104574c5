//! System endpoints: health check and runtime statistics.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Runtime statistics response.
#[derive(Debug, Serialize, ToSchema)]
struct StatsResponse {
    connections: usize,
    subscriptions: usize,
    queue_pending: usize,
    queue_in_flight: usize,
    queue_lanes: usize,
    dead_letters: usize,
    cached_results: usize,
}

/// `GET /stats` — Runtime statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "System",
    summary = "Runtime statistics",
    description = "Returns live connection, subscription, queue, and cache counters.",
    responses(
        (status = 200, description = "Current statistics", body = StatsResponse),
    )
)]
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let connections = state.registry.connection_count().await.unwrap_or(0);
    let subscriptions = state.registry.subscription_count().await.unwrap_or(0);
    let cached_results = state.result_store.count().await.unwrap_or(0);

    (
        StatusCode::OK,
        Json(StatsResponse {
            connections,
            subscriptions,
            queue_pending: state.queue.pending_count().await,
            queue_in_flight: state.queue.in_flight_count().await,
            queue_lanes: state.queue.lane_count().await,
            dead_letters: state.queue.dead_letters().len().await,
            cached_results,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
}
