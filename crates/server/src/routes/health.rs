//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use model::StoreVersion;
use serde::Serialize;
use store::Store;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store_version: Option<StoreVersion>,
}

/// GET /health — reports liveness and store reachability.
///
/// A reachable store answers `ok` with its current watermark; a store error
/// degrades the response to 503 so load balancers pull the instance.
pub async fn check<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.store.current_version().await {
        Ok(version) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                store_version: Some(version),
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "health check failed to reach the store");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    store_version: None,
                }),
            )
        }
    }
}
