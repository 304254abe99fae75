//! Durable entity kinds and their keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CitationId, CustomerId, SessionId, SpaceId, VehicleId, ZoneId};

/// Discriminant for the entity collections held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Space,
    Vehicle,
    Session,
    Citation,
}

impl EntityKind {
    /// Returns the stable string form used for persistence and filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Space => "space",
            EntityKind::Vehicle => "vehicle",
            EntityKind::Session => "session",
            EntityKind::Citation => "citation",
        }
    }

    /// Parses the stable string form back into a kind.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "space" => Some(EntityKind::Space),
            "vehicle" => Some(EntityKind::Vehicle),
            "session" => Some(EntityKind::Session),
            "citation" => Some(EntityKind::Citation),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed key identifying one entity within its collection.
///
/// Keys are unique per collection and never reused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum EntityKey {
    Space(SpaceId),
    Vehicle(VehicleId),
    Session(SessionId),
    Citation(CitationId),
}

impl EntityKey {
    /// Returns the collection this key belongs to.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityKey::Space(_) => EntityKind::Space,
            EntityKey::Vehicle(_) => EntityKind::Vehicle,
            EntityKey::Session(_) => EntityKind::Session,
            EntityKey::Citation(_) => EntityKind::Citation,
        }
    }

    /// Returns the key's identifier as a string.
    pub fn id_string(&self) -> String {
        match self {
            EntityKey::Space(id) => id.as_str().to_string(),
            EntityKey::Vehicle(id) => id.as_str().to_string(),
            EntityKey::Session(id) => id.to_string(),
            EntityKey::Citation(id) => id.to_string(),
        }
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind(), self.id_string())
    }
}

/// A metered parking space within a zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpace {
    pub id: SpaceId,
    pub zone: ZoneId,
    pub occupied: bool,
    /// Hourly rate in cents.
    pub hourly_rate_cents: i64,
    /// Maximum allowed stay in minutes.
    pub max_minutes: u32,
}

/// A registered vehicle belonging to a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub customer: CustomerId,
}

/// One parking stay; open while `ended_at` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSession {
    pub id: SessionId,
    pub vehicle: VehicleId,
    pub space: SpaceId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Total cost in cents, set when the session ends.
    pub total_cost_cents: Option<i64>,
}

impl ParkingSession {
    /// Whether the session is still open.
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// A citation issued against a vehicle parked in a space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: CitationId,
    pub vehicle: VehicleId,
    pub space: SpaceId,
    pub zone: ZoneId,
    /// Fine amount in cents.
    pub fine_cents: i64,
    pub issued_at: DateTime<Utc>,
}

/// A durable domain record stored under its [`EntityKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record")]
pub enum Entity {
    Space(ParkingSpace),
    Vehicle(Vehicle),
    Session(ParkingSession),
    Citation(Citation),
}

impl Entity {
    /// Returns the key identifying this entity.
    pub fn key(&self) -> EntityKey {
        match self {
            Entity::Space(s) => EntityKey::Space(s.id.clone()),
            Entity::Vehicle(v) => EntityKey::Vehicle(v.id.clone()),
            Entity::Session(s) => EntityKey::Session(s.id),
            Entity::Citation(c) => EntityKey::Citation(c.id),
        }
    }

    /// Returns the collection this entity belongs to.
    pub fn kind(&self) -> EntityKind {
        self.key().kind()
    }

    /// Returns the zone this entity carries, if any.
    ///
    /// Spaces and citations are zone-scoped; vehicles and sessions are not.
    pub fn zone(&self) -> Option<&ZoneId> {
        match self {
            Entity::Space(s) => Some(&s.zone),
            Entity::Citation(c) => Some(&c.zone),
            Entity::Vehicle(_) | Entity::Session(_) => None,
        }
    }

    /// Returns the vehicle this entity refers to, if any.
    pub fn vehicle(&self) -> Option<&VehicleId> {
        match self {
            Entity::Vehicle(v) => Some(&v.id),
            Entity::Session(s) => Some(&s.vehicle),
            Entity::Citation(c) => Some(&c.vehicle),
            Entity::Space(_) => None,
        }
    }

    /// Whether the entity is "active" in the sense used by filters.
    ///
    /// Only open sessions are active; every other kind reports `false`.
    pub fn is_active(&self) -> bool {
        matches!(self, Entity::Session(s) if s.is_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_space() -> ParkingSpace {
        ParkingSpace {
            id: SpaceId::new("S-1"),
            zone: ZoneId::new("Z-A"),
            occupied: false,
            hourly_rate_cents: 250,
            max_minutes: 120,
        }
    }

    #[test]
    fn entity_key_matches_kind() {
        let entity = Entity::Space(sample_space());
        assert_eq!(entity.kind(), EntityKind::Space);
        assert_eq!(entity.key(), EntityKey::Space(SpaceId::new("S-1")));
    }

    #[test]
    fn kind_string_roundtrip() {
        for kind in [
            EntityKind::Space,
            EntityKind::Vehicle,
            EntityKind::Session,
            EntityKind::Citation,
        ] {
            assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntityKind::parse("zone"), None);
    }

    #[test]
    fn session_activity() {
        let mut session = ParkingSession {
            id: SessionId::new(),
            vehicle: VehicleId::new("V-9"),
            space: SpaceId::new("S-1"),
            started_at: Utc::now(),
            ended_at: None,
            total_cost_cents: None,
        };
        assert!(Entity::Session(session.clone()).is_active());

        session.ended_at = Some(Utc::now());
        session.total_cost_cents = Some(500);
        assert!(!Entity::Session(session).is_active());
    }

    #[test]
    fn entity_serialization_roundtrip() {
        let entity = Entity::Space(sample_space());
        let json = serde_json::to_string(&entity).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(entity, back);
    }

    #[test]
    fn zone_accessor_covers_zone_scoped_kinds() {
        let space = Entity::Space(sample_space());
        assert_eq!(space.zone(), Some(&ZoneId::new("Z-A")));

        let vehicle = Entity::Vehicle(Vehicle {
            id: VehicleId::new("V-1"),
            customer: CustomerId::new(),
        });
        assert_eq!(vehicle.zone(), None);
    }
}
