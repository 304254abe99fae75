//! Recompute engine and lookup surface.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use model::{Entity, EntityKind, EventMessage, Mutation, ParkingSpace, SpaceId, ZoneId};
use serde::{Deserialize, Serialize};
use store::{EntityFilter, Store};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::records::{RecommendationRecord, RecommendationSet, ScoredSpace};
use crate::scoring::{ScoringStrategy, SpaceStats};

/// Outcome of the most recent full recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecomputeStatus {
    /// No recompute has run yet.
    Idle,
    /// A recompute is in progress.
    Running,
    /// The last recompute finished and its set was published.
    Completed { version: model::StoreVersion },
    /// The last recompute was cancelled; nothing was published.
    Cancelled,
    /// The last recompute failed; nothing was published.
    Failed { reason: String },
}

/// Scores and serves free-space recommendations per zone.
///
/// Lookups read the currently published [`RecommendationSet`] and never wait
/// on a recompute. Recomputes build a complete replacement set off to the side
/// and publish it with a single pointer swap; a cancelled or failed recompute
/// publishes nothing.
pub struct Recommender<S> {
    store: Arc<S>,
    strategy: Arc<dyn ScoringStrategy>,
    current: RwLock<Arc<RecommendationSet>>,
    status: RwLock<RecomputeStatus>,
    // Serializes recomputes so a slow one cannot publish over a newer one.
    recompute_gate: Mutex<()>,
}

impl<S: Store> Recommender<S> {
    pub fn new(store: Arc<S>, strategy: Arc<dyn ScoringStrategy>) -> Self {
        Self {
            store,
            strategy,
            current: RwLock::new(Arc::new(RecommendationSet::default())),
            status: RwLock::new(RecomputeStatus::Idle),
            recompute_gate: Mutex::new(()),
        }
    }

    /// Returns the top `limit` recommendations for a zone from the latest
    /// published set. Never blocks on recomputation; the answer may lag the
    /// store. Returns an empty record when the zone has no computed entry.
    pub async fn recommend(&self, zone: &ZoneId, limit: usize) -> RecommendationRecord {
        let set = Arc::clone(&*self.current.read().await);
        match set.record(zone) {
            Some(record) => RecommendationRecord {
                subject: record.subject.clone(),
                entries: record.top(limit).to_vec(),
                source_version: record.source_version,
            },
            None => RecommendationRecord::empty(zone.clone(), set.version()),
        }
    }

    /// The currently published set.
    pub async fn current_set(&self) -> Arc<RecommendationSet> {
        Arc::clone(&*self.current.read().await)
    }

    /// Status of the most recent full recompute.
    pub async fn status(&self) -> RecomputeStatus {
        self.status.read().await.clone()
    }

    /// Rebuilds recommendations for every zone from one store snapshot and
    /// publishes the result atomically.
    ///
    /// Cancellation is checked between zones; a cancelled run publishes
    /// nothing and leaves the previously published set in place.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn full_recompute(&self, cancel: &watch::Receiver<bool>) -> Result<RecomputeStatus> {
        let _gate = self.recompute_gate.lock().await;
        *self.status.write().await = RecomputeStatus::Running;

        let snapshot = match self.store.query(&EntityFilter::new()).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let status = RecomputeStatus::Failed {
                    reason: err.to_string(),
                };
                *self.status.write().await = status.clone();
                return Err(err.into());
            }
        };
        let version = snapshot.version;
        let (spaces_by_zone, stats) = aggregate(&snapshot.value);

        let as_of = Utc::now();
        let mut records = BTreeMap::new();
        for (zone, spaces) in spaces_by_zone {
            if *cancel.borrow() {
                tracing::info!(%version, "recompute cancelled, discarding partial results");
                metrics::counter!("recommender_recompute_cancelled_total").increment(1);
                *self.status.write().await = RecomputeStatus::Cancelled;
                return Ok(RecomputeStatus::Cancelled);
            }
            let record = self.score_zone(&zone, &spaces, &stats, as_of, version);
            records.insert(zone, record);
        }

        let set = Arc::new(RecommendationSet::new(records, version));
        self.publish(set).await;

        let status = RecomputeStatus::Completed { version };
        *self.status.write().await = status.clone();
        metrics::counter!("recommender_recompute_total").increment(1);
        tracing::info!(%version, "full recompute published");
        Ok(status)
    }

    /// Incrementally refreshes recommendations after an applied event.
    ///
    /// An event that names a zone refreshes that zone from a fresh store
    /// snapshot; when the event moves a space or citation between zones, the
    /// zone that previously listed it is refreshed too so the stale entry is
    /// dropped. A space or citation tombstone carries no zone and falls back
    /// to a full rebuild. Vehicle and session changes cannot alter rankings
    /// and are skipped. Repeated incremental updates converge on the same
    /// ranking a full recompute would build at the same store version.
    pub async fn apply_event(&self, event: &EventMessage) -> Result<()> {
        match &event.mutation {
            Mutation::Upsert(entity) => match entity.zone() {
                Some(zone) => {
                    let zone = zone.clone();
                    if let Some(previous) = self.published_elsewhere(entity, &zone).await {
                        self.refresh_zone(&previous).await?;
                    }
                    self.refresh_zone(&zone).await
                }
                None => Ok(()),
            },
            Mutation::Tombstone(key) => match key.kind() {
                EntityKind::Vehicle | EntityKind::Session => Ok(()),
                EntityKind::Space | EntityKind::Citation => {
                    let (_tx, cancel) = watch::channel(false);
                    self.full_recompute(&cancel).await.map(|_| ())
                }
            },
        }
    }

    /// The zone the published set lists this entity's space under, when that
    /// differs from the zone the event names.
    async fn published_elsewhere(&self, entity: &Entity, zone: &ZoneId) -> Option<ZoneId> {
        let space = match entity {
            Entity::Space(space) => &space.id,
            Entity::Citation(citation) => &citation.space,
            Entity::Vehicle(_) | Entity::Session(_) => return None,
        };
        let set = self.current.read().await;
        set.zone_listing(space)
            .filter(|listed| *listed != zone)
            .cloned()
    }

    /// Recomputes a single zone from a fresh store snapshot and publishes the
    /// updated set.
    #[tracing::instrument(skip(self), fields(zone = %zone))]
    pub async fn refresh_zone(&self, zone: &ZoneId) -> Result<()> {
        let filter = EntityFilter::new().zone(zone.clone());
        let snapshot = self.store.query(&filter).await?;
        let version = snapshot.version;
        let (spaces_by_zone, stats) = aggregate(&snapshot.value);

        let spaces = spaces_by_zone.get(zone).map(Vec::as_slice).unwrap_or(&[]);
        let record = self.score_zone(zone, spaces, &stats, Utc::now(), version);

        let mut current = self.current.write().await;
        *current = Arc::new(current.with_record(record));
        metrics::counter!("recommender_zone_refresh_total").increment(1);
        Ok(())
    }

    fn score_zone(
        &self,
        zone: &ZoneId,
        spaces: &[ParkingSpace],
        stats: &HashMap<SpaceId, SpaceStats>,
        as_of: chrono::DateTime<Utc>,
        version: model::StoreVersion,
    ) -> RecommendationRecord {
        let entries = spaces
            .iter()
            .filter(|space| !space.occupied)
            .map(|space| {
                let space_stats = stats.get(&space.id).copied().unwrap_or_default();
                ScoredSpace {
                    space: space.id.clone(),
                    score: self.strategy.score(space, &space_stats, as_of),
                }
            })
            .collect();
        RecommendationRecord::ranked(zone.clone(), entries, version)
    }

    async fn publish(&self, set: Arc<RecommendationSet>) {
        let mut current = self.current.write().await;
        // Never regress: a recompute from an older snapshot loses the race.
        if set.version() >= current.version() {
            *current = set;
        }
    }
}

/// Groups live spaces by zone and aggregates per-space citation stats.
fn aggregate(
    entities: &[Entity],
) -> (BTreeMap<ZoneId, Vec<ParkingSpace>>, HashMap<SpaceId, SpaceStats>) {
    let mut spaces_by_zone: BTreeMap<ZoneId, Vec<ParkingSpace>> = BTreeMap::new();
    let mut stats: HashMap<SpaceId, SpaceStats> = HashMap::new();

    for entity in entities {
        match entity {
            Entity::Space(space) => {
                spaces_by_zone
                    .entry(space.zone.clone())
                    .or_default()
                    .push(space.clone());
            }
            Entity::Citation(citation) => {
                stats
                    .entry(citation.space.clone())
                    .or_default()
                    .record_citation(citation.issued_at);
            }
            Entity::Vehicle(_) | Entity::Session(_) => {}
        }
    }

    (spaces_by_zone, stats)
}

/// Spawns a background task that runs a full recompute every `interval`.
///
/// Shutdown doubles as the cancellation signal, so an in-flight recompute is
/// abandoned (unpublished) when the signal fires.
pub fn spawn_periodic_recompute<S: Store + 'static>(
    recommender: Arc<Recommender<S>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = recommender.full_recompute(&shutdown).await {
                        tracing::warn!(error = %err, "periodic recompute failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!("periodic recompute task stopping");
                        return;
                    }
                }
            }
        }
    })
}
