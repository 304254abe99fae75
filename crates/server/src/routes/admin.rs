//! Staff-only recompute control.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use recommender::RecomputeStatus;
use serde::Serialize;
use store::Store;

use crate::error::ApiError;
use crate::routes::{AppState, caller_scope};

#[derive(Serialize)]
pub struct RecomputeTriggeredResponse {
    pub triggered: bool,
}

/// POST /admin/recompute — starts a full recompute in the background.
#[tracing::instrument(skip(state, headers))]
pub async fn trigger<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<RecomputeTriggeredResponse>), ApiError> {
    let scope = caller_scope(&headers)?;
    state.query.trigger_recompute(&scope)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RecomputeTriggeredResponse { triggered: true }),
    ))
}

/// GET /admin/recompute/status — status of the most recent recompute.
#[tracing::instrument(skip(state, headers))]
pub async fn status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<RecomputeStatus>, ApiError> {
    let scope = caller_scope(&headers)?;
    let status = state.query.recompute_status(&scope).await?;
    Ok(Json(status))
}
