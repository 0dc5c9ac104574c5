//! REST endpoint handlers organized by resource.

pub mod card;
pub mod dead_letter;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new().merge(card::routes()).merge(dead_letter::routes())
}
