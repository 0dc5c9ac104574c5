//! lexicast server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints, the
//! worker pool, the broadcaster task, and the background sweeps.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use lexicast::admission::AdmissionController;
use lexicast::api;
use lexicast::app_state::AppState;
use lexicast::broadcast::{
    Broadcaster, EventForwarder, PushTransport, WsPushTransport, spawn_broadcaster,
};
use lexicast::config::LexicastConfig;
use lexicast::dispatch::{CardPipeline, StubPipeline, spawn_workers};
use lexicast::persistence::{InMemoryResultStore, PostgresResultStore, ResultStore};
use lexicast::queue::{DeadLetterChannel, WorkQueue, spawn_visibility_sweep};
use lexicast::registry::{
    ConnectionRegistry, ConnectionStore, InMemoryConnectionStore, PostgresConnectionStore,
    spawn_expiry_sweep,
};
use lexicast::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = LexicastConfig::from_env()?;
    tracing::info!(addr = %config.listen_addr, "starting lexicast");

    // Build stores (Postgres-backed when persistence is enabled,
    // otherwise in-memory)
    let (connection_store, result_store): (Arc<dyn ConnectionStore>, Arc<dyn ResultStore>) =
        if config.persistence_enabled {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .min_connections(config.database_min_connections)
                .acquire_timeout(std::time::Duration::from_secs(
                    config.database_connect_timeout_secs,
                ))
                .connect(&config.database_url)
                .await?;
            tracing::info!("connected to PostgreSQL");

            let connection_store = PostgresConnectionStore::new(pool.clone());
            connection_store.ensure_schema().await?;
            let result_store = PostgresResultStore::new(pool);
            result_store.ensure_schema().await?;
            (Arc::new(connection_store), Arc::new(result_store))
        } else {
            tracing::info!("persistence disabled, using in-memory stores");
            (
                Arc::new(InMemoryConnectionStore::new()),
                Arc::new(InMemoryResultStore::new()),
            )
        };

    // Connection registry and its expiry sweep
    let registry = ConnectionRegistry::new(connection_store, config.connection_ttl_secs);
    spawn_expiry_sweep(registry.clone(), config.expiry_sweep_interval_secs);

    // Work queue, dead letters, visibility sweep
    let dead_letters = Arc::new(DeadLetterChannel::new(config.dead_letter_capacity));
    let queue = Arc::new(WorkQueue::new(
        config.queue_visibility_timeout_secs,
        dead_letters,
    ));
    spawn_visibility_sweep(Arc::clone(&queue), config.visibility_sweep_interval_secs);

    // Push transport and fan-out
    let transport = Arc::new(WsPushTransport::new());
    let push_transport = Arc::clone(&transport) as Arc<dyn PushTransport>;
    let broadcaster = Broadcaster::new(
        registry.clone(),
        Arc::clone(&push_transport),
        config.fanout_concurrency,
        config.push_timeout_ms,
    );
    let (forwarder, event_rx) = EventForwarder::channel(config.event_buffer_capacity);
    spawn_broadcaster(broadcaster, event_rx);

    // Pipeline and workers
    let pipeline: Arc<dyn CardPipeline> =
        Arc::new(StubPipeline::new(config.pipeline_stage_delay_ms));
    spawn_workers(
        config.worker_count,
        &queue,
        &pipeline,
        &result_store,
        &forwarder,
    );

    // Admission controller
    let admission = Arc::new(AdmissionController::new(
        registry.clone(),
        Arc::clone(&queue),
        Arc::clone(&result_store),
        push_transport,
    ));

    // Build application state
    let app_state = AppState {
        registry,
        queue,
        admission,
        result_store,
        transport,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
