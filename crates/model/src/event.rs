//! Broker event envelope and mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKey};
use crate::ids::{MessageId, Seq};

/// The state change an event describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "target")]
pub enum Mutation {
    /// Create or update the entity under its key.
    Upsert(Entity),
    /// Delete the entity under the given key.
    Tombstone(EntityKey),
}

impl Mutation {
    /// Returns the entity key this mutation targets.
    pub fn key(&self) -> EntityKey {
        match self {
            Mutation::Upsert(entity) => entity.key(),
            Mutation::Tombstone(key) => key.clone(),
        }
    }
}

/// An immutable fact delivered from the broker.
///
/// `message_id` keys idempotent apply: the same message applied twice leaves
/// the store unchanged. `seq` orders mutations for one entity key regardless
/// of arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub message_id: MessageId,
    pub seq: Seq,
    pub occurred_at: DateTime<Utc>,
    pub mutation: Mutation,
}

impl EventMessage {
    /// Creates a new event with a fresh message ID, stamped now.
    pub fn new(seq: Seq, mutation: Mutation) -> Self {
        Self {
            message_id: MessageId::new(),
            seq,
            occurred_at: Utc::now(),
            mutation,
        }
    }

    /// Returns the entity key this event targets.
    pub fn key(&self) -> EntityKey {
        self.mutation.key()
    }
}
