//! Server entry point.

use std::sync::Arc;
use std::time::Duration;

use server::config::Config;
use store::SqliteStore;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Open the store and wire the pipeline
    let store = SqliteStore::connect(&config.database_url)
        .await
        .expect("failed to open database");
    let store = Arc::new(store);
    let (state, pipeline) = server::create_state(Arc::clone(&store), config.ingest_workers);

    // 4. Seed recommendations and keep them fresh
    let (_tx, never_cancel) = tokio::sync::watch::channel(false);
    if let Err(err) = pipeline.recommender.full_recompute(&never_cancel).await {
        tracing::warn!(error = %err, "initial recompute failed, serving empty recommendations");
    }
    recommender::spawn_periodic_recompute(
        Arc::clone(&pipeline.recommender),
        Duration::from_secs(config.recompute_interval_secs),
        pipeline.shutdown.subscribe(),
    );

    // 5. Build the application and start serving
    let app = server::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, workers = config.ingest_workers, "starting server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 6. Stop the pipeline; unacked messages stay queued for redelivery
    let _ = pipeline.shutdown.send(true);
    for worker in pipeline.workers {
        if let Err(err) = worker.await {
            tracing::error!(error = %err, "ingest worker panicked");
        }
    }

    tracing::info!("server shut down gracefully");
}
