//! HTTP server wiring for the parking backend.
//!
//! Composes the store, ingest workers, recommender, and query service into
//! one axum application with structured logging (tracing) and Prometheus
//! metrics. Events arrive over POST /events, flow through the channel source
//! into the ingest workers, and applied events drive incremental
//! recommendation refreshes.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use ingest::{ChannelSource, spawn_workers};
use metrics_exporter_prometheus::PrometheusHandle;
use query::QueryService;
use recommender::{CitationAvoidance, Recommender};
use store::Store;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Everything `create_state` wires up besides the handler state itself.
pub struct Pipeline<S: Store> {
    pub recommender: Arc<Recommender<S>>,
    pub workers: Vec<JoinHandle<ingest::Result<()>>>,
    pub shutdown: watch::Sender<bool>,
}

/// Wires the ingestion pipeline and query service around a store.
///
/// Spawns `ingest_workers` workers consuming from a fresh channel source.
/// Applied events are forwarded to the recommender for incremental
/// refreshes. Signalling the returned shutdown sender stops the workers;
/// unacked messages stay queued.
pub fn create_state<S: Store + 'static>(
    store: Arc<S>,
    ingest_workers: usize,
) -> (Arc<AppState<S>>, Pipeline<S>) {
    let source = Arc::new(ChannelSource::new());
    let recommender = Arc::new(Recommender::new(
        Arc::clone(&store),
        Arc::new(CitationAvoidance),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let workers = spawn_workers(
        Arc::clone(&store),
        Arc::clone(&source),
        Some(updates_tx),
        ingest_workers,
        shutdown_rx.clone(),
    );

    // Pump applied events into per-zone recommendation refreshes. Ends when
    // the last worker drops its sender.
    let pump_recommender = Arc::clone(&recommender);
    tokio::spawn(async move {
        while let Some(event) = updates_rx.recv().await {
            if let Err(err) = pump_recommender.apply_event(&event).await {
                tracing::warn!(error = %err, "incremental recommendation refresh failed");
            }
        }
    });

    let query = QueryService::new(Arc::clone(&store), Arc::clone(&recommender), shutdown_rx);
    let state = Arc::new(AppState { store, query, source });

    (
        state,
        Pipeline {
            recommender,
            workers,
            shutdown: shutdown_tx,
        },
    )
}

/// Creates the axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/entities", get(routes::entities::list::<S>))
        .route("/recommendations/{zone}", get(routes::recommendations::get::<S>))
        .route("/events", post(routes::events::submit::<S>))
        .route("/admin/recompute", post(routes::admin::trigger::<S>))
        .route("/admin/recompute/status", get(routes::admin::status::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
