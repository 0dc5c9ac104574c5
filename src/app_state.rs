//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::admission::AdmissionController;
use crate::broadcast::WsPushTransport;
use crate::persistence::ResultStore;
use crate::queue::WorkQueue;
use crate::registry::ConnectionRegistry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Connection and subscription registry.
    pub registry: ConnectionRegistry,
    /// Work queue (and, through it, the dead-letter channel).
    pub queue: Arc<WorkQueue>,
    /// Admission controller for card requests.
    pub admission: Arc<AdmissionController>,
    /// Finished-card store, for the poll endpoint and stats.
    pub result_store: Arc<dyn ResultStore>,
    /// WebSocket push transport, for attaching connections.
    pub transport: Arc<WsPushTransport>,
}
