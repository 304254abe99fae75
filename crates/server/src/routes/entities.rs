//! Scoped entity listing.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use model::{Entity, EntityKind, VehicleId, ZoneId};
use query::{Page, QueryCriteria};
use serde::Deserialize;
use store::Store;

use crate::error::ApiError;
use crate::routes::{AppState, caller_scope};

#[derive(Debug, Default, Deserialize)]
pub struct EntityListParams {
    pub kind: Option<String>,
    pub zone: Option<String>,
    pub vehicle: Option<String>,
    #[serde(default)]
    pub active: bool,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl EntityListParams {
    fn into_criteria(self) -> Result<QueryCriteria, ApiError> {
        let kind = match self.kind {
            None => None,
            Some(raw) => Some(
                EntityKind::parse(&raw)
                    .ok_or_else(|| ApiError::BadRequest(format!("unknown entity kind: {raw}")))?,
            ),
        };
        let defaults = QueryCriteria::default();
        Ok(QueryCriteria {
            kind,
            zone: self.zone.map(ZoneId::new),
            vehicle: self.vehicle.map(VehicleId::new),
            active_only: self.active,
            offset: self.offset.unwrap_or(0),
            limit: self.limit.unwrap_or(defaults.limit),
        })
    }
}

/// GET /entities — one page of entities visible to the caller.
#[tracing::instrument(skip(state, headers, params))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Query(params): Query<EntityListParams>,
) -> Result<Json<Page<Entity>>, ApiError> {
    let scope = caller_scope(&headers)?;
    let criteria = params.into_criteria()?;
    let page = state.query.query(&scope, &criteria).await?;
    Ok(Json(page))
}
