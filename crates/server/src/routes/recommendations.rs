//! Recommendation lookup.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use model::ZoneId;
use query::RecommendationReply;
use serde::Deserialize;
use store::Store;

use crate::error::ApiError;
use crate::routes::{AppState, caller_scope};

const DEFAULT_LIMIT: usize = 5;

#[derive(Debug, Default, Deserialize)]
pub struct RecommendParams {
    pub limit: Option<usize>,
}

/// GET /recommendations/{zone} — top free spaces for a zone.
///
/// The reply may lag recently applied events; `stale` says so.
#[tracing::instrument(skip(state, headers, params))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(zone): Path<String>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<RecommendationReply>, ApiError> {
    caller_scope(&headers)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let reply = state.query.recommend(&ZoneId::new(zone), limit).await?;
    Ok(Json(reply))
}
