//! End-to-end ingestion scenarios over the in-memory channel and store.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ingest::{ChannelSource, Ingestor, MessageSource, spawn_workers};
use model::{
    Entity, EntityKey, EventMessage, Mutation, ParkingSpace, Seq, SpaceId, StoreVersion, ZoneId,
};
use store::{ApplyOutcome, EntityFilter, InMemoryStore, Store, StoreError, Versioned};
use tokio::sync::watch;

fn space_event(id: &str, occupied: bool, seq: i64) -> EventMessage {
    EventMessage::new(
        Seq::new(seq),
        Mutation::Upsert(Entity::Space(ParkingSpace {
            id: SpaceId::new(id),
            zone: ZoneId::new("Z-A"),
            occupied,
            hourly_rate_cents: 150,
            max_minutes: 90,
        })),
    )
}

async fn publish(source: &ChannelSource, event: &EventMessage) {
    source.publish(serde_json::to_vec(event).unwrap()).await;
}

async fn run_to_drain(store: Arc<InMemoryStore>, source: Arc<ChannelSource>) {
    source.close();
    let ingestor = Ingestor::new(store, source);
    let (_tx, shutdown) = watch::channel(false);
    ingestor.run(shutdown).await.unwrap();
}

#[tokio::test]
async fn duplicate_message_applies_once() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(ChannelSource::new());

    // Same message id delivered twice (broker at-least-once).
    let event = space_event("C1", false, 1);
    publish(&source, &event).await;
    publish(&source, &event).await;
    run_to_drain(Arc::clone(&store), source).await;

    assert_eq!(store.current_version().await.unwrap(), StoreVersion::new(1));
    assert_eq!(store.entity_count().await, 1);
}

#[tokio::test]
async fn out_of_order_delivery_resolves_by_seq() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(ChannelSource::new());

    // seq=2 arrives before seq=1; final state must reflect seq=2.
    let newer = space_event("S-1", true, 2);
    let older = space_event("S-1", false, 1);
    publish(&source, &newer).await;
    publish(&source, &older).await;
    run_to_drain(Arc::clone(&store), source).await;

    let entity = store.get(&newer.key()).await.unwrap().unwrap();
    assert!(matches!(entity, Entity::Space(s) if s.occupied));
}

#[tokio::test]
async fn malformed_payload_is_acked_and_store_untouched() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(ChannelSource::new());

    source.publish(b"not an event".to_vec()).await;
    run_to_drain(Arc::clone(&store), Arc::clone(&source)).await;

    assert_eq!(store.current_version().await.unwrap(), StoreVersion::zero());
    assert!(source.is_empty().await);
}

#[tokio::test]
async fn concurrent_workers_apply_all_messages_exactly_once() {
    let store = Arc::new(InMemoryStore::new());
    let source = Arc::new(ChannelSource::new());

    for n in 0..50 {
        publish(&source, &space_event(&format!("S-{n}"), false, 1)).await;
    }
    source.close();

    let (_tx, shutdown) = watch::channel(false);
    let handles = spawn_workers(Arc::clone(&store), Arc::clone(&source), None, 4, shutdown);
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.entity_count().await, 50);
    assert_eq!(store.current_version().await.unwrap(), StoreVersion::new(50));
}

/// Store wrapper that fails the first `failures` apply calls with a
/// retryable error.
struct FlakyStore {
    inner: InMemoryStore,
    remaining_failures: AtomicUsize,
}

impl FlakyStore {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryStore::new(),
            remaining_failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl Store for FlakyStore {
    async fn apply(&self, event: &EventMessage) -> store::Result<ApplyOutcome> {
        let remaining = self.remaining_failures.load(Ordering::Acquire);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::Release);
            return Err(StoreError::Storage(sqlx::Error::PoolTimedOut));
        }
        self.inner.apply(event).await
    }

    async fn get(&self, key: &EntityKey) -> store::Result<Option<Entity>> {
        self.inner.get(key).await
    }

    async fn query(&self, filter: &EntityFilter) -> store::Result<Versioned<Vec<Entity>>> {
        self.inner.query(filter).await
    }

    async fn current_version(&self) -> store::Result<StoreVersion> {
        self.inner.current_version().await
    }
}

#[tokio::test]
async fn transient_storage_failure_redelivers_without_duplicating() {
    let store = Arc::new(FlakyStore::new(2));
    let source = Arc::new(ChannelSource::new());

    let event = space_event("S-1", false, 1);
    publish(&source, &event).await;
    source.close();

    let ingestor = Ingestor::new(Arc::clone(&store), Arc::clone(&source));
    let (_tx, shutdown) = watch::channel(false);
    ingestor.run(shutdown).await.unwrap();

    // Two nacks and one successful apply later, exactly one entity exists.
    assert_eq!(
        store.inner.current_version().await.unwrap(),
        StoreVersion::new(1)
    );
    assert!(store.inner.get(&event.key()).await.unwrap().is_some());
    assert!(source.is_empty().await);
}

#[tokio::test]
async fn fatal_store_error_halts_the_worker() {
    struct CorruptStore;

    #[async_trait]
    impl Store for CorruptStore {
        async fn apply(&self, _event: &EventMessage) -> store::Result<ApplyOutcome> {
            Err(StoreError::Corrupt("torn page".to_string()))
        }
        async fn get(&self, _key: &EntityKey) -> store::Result<Option<Entity>> {
            Ok(None)
        }
        async fn query(&self, _filter: &EntityFilter) -> store::Result<Versioned<Vec<Entity>>> {
            Ok(Versioned::new(StoreVersion::zero(), Vec::new()))
        }
        async fn current_version(&self) -> store::Result<StoreVersion> {
            Ok(StoreVersion::zero())
        }
    }

    let source = Arc::new(ChannelSource::new());
    publish(&source, &space_event("S-1", false, 1)).await;

    let ingestor = Ingestor::new(Arc::new(CorruptStore), Arc::clone(&source));
    let (_tx, shutdown) = watch::channel(false);
    let result = ingestor.run(shutdown).await;

    assert!(result.is_err());
    // The message was nacked, not lost: still queued for a recovered worker.
    assert_eq!(source.len().await, 1);
}
