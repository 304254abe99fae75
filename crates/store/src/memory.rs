use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use model::{Entity, EntityKey, EventMessage, MessageId, Mutation, Seq, StoreVersion};
use tokio::sync::RwLock;

use crate::{
    Result,
    store::{ApplyOutcome, EntityFilter, Store, Versioned},
};

/// Per-key state: the highest sequence hint seen and the live entity, if any.
/// A tombstoned key keeps its seq so a late, older upsert cannot resurrect it.
#[derive(Debug, Clone)]
struct KeyState {
    seq: Seq,
    live: Option<Entity>,
}

#[derive(Default)]
struct Inner {
    entities: HashMap<EntityKey, KeyState>,
    applied: HashMap<MessageId, StoreVersion>,
    version: StoreVersion,
}

/// In-memory store implementation.
///
/// Holds everything behind one `RwLock`, giving the same atomic-apply and
/// snapshot-query semantics as the SQLite implementation. Used by tests and
/// available to embedders that don't need durability.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live entities.
    pub async fn entity_count(&self) -> usize {
        self.inner
            .read()
            .await
            .entities
            .values()
            .filter(|s| s.live.is_some())
            .count()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn apply(&self, event: &EventMessage) -> Result<ApplyOutcome> {
        let mut inner = self.inner.write().await;

        if let Some(&at) = inner.applied.get(&event.message_id) {
            return Ok(ApplyOutcome::Duplicate(at));
        }

        let version = inner.version.next();
        inner.version = version;
        inner.applied.insert(event.message_id, version);

        let key = event.key();
        if let Some(state) = inner.entities.get(&key)
            && state.seq >= event.seq
        {
            return Ok(ApplyOutcome::Superseded(version));
        }

        let live = match &event.mutation {
            Mutation::Upsert(entity) => Some(entity.clone()),
            Mutation::Tombstone(_) => None,
        };
        inner.entities.insert(
            key,
            KeyState {
                seq: event.seq,
                live,
            },
        );

        Ok(ApplyOutcome::Applied(version))
    }

    async fn get(&self, key: &EntityKey) -> Result<Option<Entity>> {
        let inner = self.inner.read().await;
        Ok(inner.entities.get(key).and_then(|s| s.live.clone()))
    }

    async fn query(&self, filter: &EntityFilter) -> Result<Versioned<Vec<Entity>>> {
        let inner = self.inner.read().await;
        let mut matched: Vec<Entity> = inner
            .entities
            .values()
            .filter_map(|s| s.live.as_ref())
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        // Same ordering contract as the SQLite backend: kind name, then id.
        matched.sort_by_key(|e| {
            let key = e.key();
            (key.kind().as_str(), key.id_string())
        });
        Ok(Versioned::new(inner.version, matched))
    }

    async fn current_version(&self) -> Result<StoreVersion> {
        Ok(self.inner.read().await.version)
    }
}
