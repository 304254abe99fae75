//! Shared data contracts for the parking backend.
//!
//! This crate defines the entity and event types every other component
//! exchanges: typed identifiers, the durable entity kinds (spaces, vehicles,
//! sessions, citations), and the broker event envelope. It intentionally
//! carries no behavior beyond constructors and accessors.

pub mod entity;
pub mod event;
pub mod ids;

pub use entity::{Citation, Entity, EntityKey, EntityKind, ParkingSession, ParkingSpace, Vehicle};
pub use event::{EventMessage, Mutation};
pub use ids::{CitationId, CustomerId, MessageId, Seq, SessionId, SpaceId, StoreVersion, VehicleId, ZoneId};
