use async_trait::async_trait;
use model::{Entity, EntityKey, EntityKind, EventMessage, StoreVersion, VehicleId, ZoneId};

use crate::Result;

/// Outcome of applying one event message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The mutation changed entity state; the watermark advanced to this version.
    Applied(StoreVersion),
    /// The message was new but its sequence hint was not newer than the stored
    /// state for its key. It was durably recorded (the watermark advanced) but
    /// entity state is unchanged: last-writer-wins by ordering hint, not by
    /// arrival time.
    Superseded(StoreVersion),
    /// The message ID was already applied. Nothing changed and the watermark
    /// did not advance; the version at which it originally applied is returned.
    Duplicate(StoreVersion),
}

impl ApplyOutcome {
    /// The store version associated with this outcome.
    pub fn version(&self) -> StoreVersion {
        match self {
            ApplyOutcome::Applied(v) | ApplyOutcome::Superseded(v) | ApplyOutcome::Duplicate(v) => {
                *v
            }
        }
    }
}

/// Filter criteria for [`Store::query`].
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    /// Restrict to one entity collection.
    pub kind: Option<EntityKind>,
    /// Restrict to entities carrying this zone (spaces and citations).
    pub zone: Option<ZoneId>,
    /// Restrict to entities referring to this vehicle.
    pub vehicle: Option<VehicleId>,
    /// Restrict to open sessions.
    pub active_only: bool,
}

impl EntityFilter {
    /// Creates an empty filter matching every live entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one entity kind.
    pub fn kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restricts to entities carrying the given zone.
    pub fn zone(mut self, zone: ZoneId) -> Self {
        self.zone = Some(zone);
        self
    }

    /// Restricts to entities referring to the given vehicle.
    pub fn vehicle(mut self, vehicle: VehicleId) -> Self {
        self.vehicle = Some(vehicle);
        self
    }

    /// Restricts to open sessions.
    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    /// Whether a live entity matches this filter.
    pub fn matches(&self, entity: &Entity) -> bool {
        if let Some(kind) = self.kind
            && entity.kind() != kind
        {
            return false;
        }
        if let Some(ref zone) = self.zone
            && entity.zone() != Some(zone)
        {
            return false;
        }
        if let Some(ref vehicle) = self.vehicle
            && entity.vehicle() != Some(vehicle)
        {
            return false;
        }
        if self.active_only && !entity.is_active() {
            return false;
        }
        true
    }
}

/// A value read at a known store version.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: StoreVersion,
    pub value: T,
}

impl<T> Versioned<T> {
    /// Pairs a value with the version it was read at.
    pub fn new(version: StoreVersion, value: T) -> Self {
        Self { version, value }
    }
}

/// Core contract for durable entity storage.
///
/// `apply` is atomic per entity and is the only mutation path; `query`
/// returns a consistent snapshot together with the watermark it was read at.
/// All implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait Store: Send + Sync {
    /// Applies one event message.
    ///
    /// Idempotent on `message_id` and ordered per key by `seq`; see
    /// [`ApplyOutcome`] for the three durable results.
    async fn apply(&self, event: &EventMessage) -> Result<ApplyOutcome>;

    /// Fetches the live entity under `key`, if any.
    ///
    /// Tombstoned entities and keys never written both return `None`.
    async fn get(&self, key: &EntityKey) -> Result<Option<Entity>>;

    /// Returns all live entities matching `filter`, as one consistent
    /// snapshot. Results are ordered by kind name, then id, for determinism
    /// across backends.
    async fn query(&self, filter: &EntityFilter) -> Result<Versioned<Vec<Entity>>>;

    /// Returns the current watermark.
    async fn current_version(&self) -> Result<StoreVersion>;
}
