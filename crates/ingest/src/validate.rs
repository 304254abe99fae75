//! Payload validation: raw broker bytes into a well-formed event.

use model::{Entity, EventMessage, Mutation};
use thiserror::Error;

/// Why a payload was rejected.
///
/// Rejected messages are acknowledged and dropped, never retried; retrying
/// malformed input would only produce a poison-message loop.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("empty payload")]
    Empty,

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid event: {0}")]
    Invalid(&'static str),
}

/// Parses and validates a raw payload into an [`EventMessage`].
pub fn validate(payload: &[u8]) -> Result<EventMessage, ValidationError> {
    if payload.is_empty() {
        return Err(ValidationError::Empty);
    }

    let event: EventMessage = serde_json::from_slice(payload)?;

    if event.seq.as_i64() < 0 {
        return Err(ValidationError::Invalid("negative sequence hint"));
    }

    match &event.mutation {
        Mutation::Upsert(Entity::Space(space)) => {
            if space.id.as_str().trim().is_empty() {
                return Err(ValidationError::Invalid("blank space id"));
            }
            if space.zone.as_str().trim().is_empty() {
                return Err(ValidationError::Invalid("blank zone id"));
            }
            if space.hourly_rate_cents < 0 {
                return Err(ValidationError::Invalid("negative hourly rate"));
            }
            if space.max_minutes == 0 {
                return Err(ValidationError::Invalid("zero max stay"));
            }
        }
        Mutation::Upsert(Entity::Vehicle(vehicle)) => {
            if vehicle.id.as_str().trim().is_empty() {
                return Err(ValidationError::Invalid("blank vehicle id"));
            }
        }
        Mutation::Upsert(Entity::Session(session)) => {
            if session.vehicle.as_str().trim().is_empty() {
                return Err(ValidationError::Invalid("blank vehicle id"));
            }
            if session.space.as_str().trim().is_empty() {
                return Err(ValidationError::Invalid("blank space id"));
            }
            if let Some(ended_at) = session.ended_at
                && ended_at < session.started_at
            {
                return Err(ValidationError::Invalid("session ends before it starts"));
            }
            if session.total_cost_cents.is_some_and(|c| c < 0) {
                return Err(ValidationError::Invalid("negative session cost"));
            }
        }
        Mutation::Upsert(Entity::Citation(citation)) => {
            if citation.vehicle.as_str().trim().is_empty() {
                return Err(ValidationError::Invalid("blank vehicle id"));
            }
            if citation.space.as_str().trim().is_empty() {
                return Err(ValidationError::Invalid("blank space id"));
            }
            if citation.fine_cents < 0 {
                return Err(ValidationError::Invalid("negative fine"));
            }
        }
        Mutation::Tombstone(_) => {}
    }

    Ok(event)
}
