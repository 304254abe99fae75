//! Event intake.
//!
//! Stand-in for the broker transport: payloads posted here are queued on the
//! in-process channel the ingest workers consume from. Validation happens in
//! the workers, so a well-formed HTTP request with a garbage payload is still
//! accepted here and dropped there.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use store::Store;

use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Serialize)]
pub struct EventAcceptedResponse {
    pub queued: usize,
}

/// POST /events — enqueues a raw event payload for ingestion.
#[tracing::instrument(skip(state, body))]
pub async fn submit<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    body: Bytes,
) -> Result<(StatusCode, Json<EventAcceptedResponse>), ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty event payload".to_string()));
    }
    state.source.publish(body.to_vec()).await;
    let queued = state.source.len().await;
    Ok((StatusCode::ACCEPTED, Json(EventAcceptedResponse { queued })))
}
