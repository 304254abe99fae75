//! The query service itself.

use std::collections::HashSet;
use std::sync::Arc;

use model::{CustomerId, Entity, EntityKind, StoreVersion, VehicleId, ZoneId};
use recommender::{RecommendationRecord, Recommender, RecomputeStatus};
use serde::Serialize;
use store::{EntityFilter, Store, StoreError};
use tokio::sync::watch;

use crate::error::{QueryError, Result};
use crate::scope::CallerScope;

const DEFAULT_PAGE_LIMIT: usize = 50;
const MAX_PAGE_LIMIT: usize = 500;

/// What to fetch and which page of it.
#[derive(Debug, Clone)]
pub struct QueryCriteria {
    pub kind: Option<EntityKind>,
    pub zone: Option<ZoneId>,
    pub vehicle: Option<VehicleId>,
    pub active_only: bool,
    pub offset: usize,
    pub limit: usize,
}

impl Default for QueryCriteria {
    fn default() -> Self {
        Self {
            kind: None,
            zone: None,
            vehicle: None,
            active_only: false,
            offset: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl QueryCriteria {
    fn to_filter(&self) -> EntityFilter {
        let mut filter = EntityFilter::new();
        if let Some(kind) = self.kind {
            filter = filter.kind(kind);
        }
        if let Some(zone) = &self.zone {
            filter = filter.zone(zone.clone());
        }
        if let Some(vehicle) = &self.vehicle {
            filter = filter.vehicle(vehicle.clone());
        }
        if self.active_only {
            filter = filter.active_only();
        }
        filter
    }

    fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }
}

/// One page of results, tagged with the snapshot version it was read at.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub version: StoreVersion,
}

/// A recommendation lookup result with a staleness annotation.
///
/// `stale` means the record was computed against an older store version than
/// the current one; the entries may not reflect the latest applied events.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationReply {
    pub record: RecommendationRecord,
    pub store_version: StoreVersion,
    pub stale: bool,
}

/// Scoped read facade over the store and the recommender.
pub struct QueryService<S> {
    store: Arc<S>,
    recommender: Arc<Recommender<S>>,
    // Doubles as the cancellation signal for triggered recomputes.
    shutdown: watch::Receiver<bool>,
}

impl<S: Store + 'static> QueryService<S> {
    pub fn new(
        store: Arc<S>,
        recommender: Arc<Recommender<S>>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            store,
            recommender,
            shutdown,
        }
    }

    /// Fetches one page of entities visible to the caller.
    ///
    /// Staff queries push all criteria down to the store. Customer queries
    /// read a broad snapshot so vehicle ownership can be resolved within the
    /// same snapshot, then filter for visibility.
    #[tracing::instrument(skip(self, scope, criteria))]
    pub async fn query(&self, scope: &CallerScope, criteria: &QueryCriteria) -> Result<Page<Entity>> {
        let (items, version) = match scope {
            CallerScope::Staff => {
                let snapshot = self
                    .store
                    .query(&criteria.to_filter())
                    .await
                    .map_err(log_store_error)?;
                (snapshot.value, snapshot.version)
            }
            CallerScope::Customer(customer) => {
                let snapshot = self
                    .store
                    .query(&EntityFilter::new())
                    .await
                    .map_err(log_store_error)?;
                let owned = owned_vehicles(customer, &snapshot.value);
                let filter = criteria.to_filter();
                let items = snapshot
                    .value
                    .into_iter()
                    .filter(|entity| filter.matches(entity) && scope.permits(entity, &owned))
                    .collect();
                (items, snapshot.version)
            }
        };

        Ok(paginate(items, criteria, version))
    }

    /// Looks up recommendations for a zone, annotated with staleness against
    /// the current store version. Never waits on a recompute in progress.
    #[tracing::instrument(skip(self), fields(zone = %zone))]
    pub async fn recommend(&self, zone: &ZoneId, limit: usize) -> Result<RecommendationReply> {
        let record = self.recommender.recommend(zone, limit).await;
        let store_version = self
            .store
            .current_version()
            .await
            .map_err(log_store_error)?;
        let stale = record.source_version < store_version;
        Ok(RecommendationReply {
            record,
            store_version,
            stale,
        })
    }

    /// Starts a full recompute in the background. Staff only.
    pub fn trigger_recompute(&self, scope: &CallerScope) -> Result<()> {
        if !scope.can_administer() {
            return Err(QueryError::Forbidden);
        }
        let recommender = Arc::clone(&self.recommender);
        let cancel = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = recommender.full_recompute(&cancel).await {
                tracing::warn!(error = %err, "triggered recompute failed");
            }
        });
        Ok(())
    }

    /// Reports the status of the most recent recompute. Staff only.
    pub async fn recompute_status(&self, scope: &CallerScope) -> Result<RecomputeStatus> {
        if !scope.can_administer() {
            return Err(QueryError::Forbidden);
        }
        Ok(self.recommender.status().await)
    }
}

/// Vehicles registered to `customer` within the snapshot.
fn owned_vehicles(customer: &CustomerId, entities: &[Entity]) -> HashSet<VehicleId> {
    entities
        .iter()
        .filter_map(|entity| match entity {
            Entity::Vehicle(vehicle) if vehicle.customer == *customer => Some(vehicle.id.clone()),
            _ => None,
        })
        .collect()
}

fn paginate(items: Vec<Entity>, criteria: &QueryCriteria, version: StoreVersion) -> Page<Entity> {
    let total = items.len();
    let limit = criteria.effective_limit();
    let offset = criteria.offset.min(total);
    let end = (offset + limit).min(total);
    Page {
        items: items[offset..end].to_vec(),
        total,
        offset,
        limit,
        version,
    }
}

fn log_store_error(err: StoreError) -> QueryError {
    tracing::error!(error = %err, "store request failed");
    QueryError::Unavailable
}
