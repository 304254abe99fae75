//! The ingest worker: pulls, validates, applies, settles.

use std::sync::Arc;

use model::EventMessage;
use store::{ApplyOutcome, Store};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::Result;
use crate::source::{Delivery, MessageSource};
use crate::validate::validate;

/// Consumes messages from a source and applies them to the store.
///
/// Safe to run as several concurrent workers over one shared source: store
/// application is idempotent and per-key ordered, so redelivery and racing
/// workers cannot duplicate effects.
pub struct Ingestor<S, M> {
    store: Arc<S>,
    source: Arc<M>,
    /// Applied events are forwarded here so derived state (the recommender)
    /// can update incrementally off the same stream.
    updates: Option<mpsc::UnboundedSender<EventMessage>>,
}

impl<S, M> Ingestor<S, M>
where
    S: Store + 'static,
    M: MessageSource + 'static,
{
    /// Creates an ingestor over the given store and source.
    pub fn new(store: Arc<S>, source: Arc<M>) -> Self {
        Self {
            store,
            source,
            updates: None,
        }
    }

    /// Forwards every state-changing apply to the given channel.
    pub fn with_updates(mut self, updates: mpsc::UnboundedSender<EventMessage>) -> Self {
        self.updates = Some(updates);
        self
    }

    /// Runs the worker loop until the source drains or shutdown is signaled.
    ///
    /// On shutdown, the message currently being waited for stays queued
    /// (unacknowledged) for safe redelivery. Only fatal store errors abort
    /// the loop.
    #[tracing::instrument(skip_all)]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                delivery = self.source.receive() => {
                    let Some(delivery) = delivery else { break };
                    self.handle(delivery).await?;
                }
                changed = shutdown.changed() => {
                    // A dropped sender means the process is tearing down.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("ingest worker stopped");
        Ok(())
    }

    /// Drives one message through `Received → Validated → Applied | Rejected`.
    pub async fn handle(&self, delivery: Delivery) -> Result<()> {
        let event = match validate(&delivery.payload) {
            Ok(event) => event,
            Err(reason) => {
                // Malformed input is dropped, not retried.
                tracing::warn!(%reason, "rejected message");
                metrics::counter!("ingest_rejected_total").increment(1);
                self.source.ack(delivery).await;
                return Ok(());
            }
        };

        match self.store.apply(&event).await {
            Ok(outcome) => {
                match outcome {
                    ApplyOutcome::Applied(version) => {
                        tracing::debug!(message_id = %event.message_id, %version, "applied");
                        metrics::counter!("ingest_applied_total").increment(1);
                        if let Some(updates) = &self.updates {
                            // Receiver loss only degrades recommendation freshness.
                            let _ = updates.send(event);
                        }
                    }
                    ApplyOutcome::Superseded(_) => {
                        metrics::counter!("ingest_superseded_total").increment(1);
                    }
                    ApplyOutcome::Duplicate(_) => {
                        metrics::counter!("ingest_duplicate_total").increment(1);
                    }
                }
                self.source.ack(delivery).await;
                Ok(())
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(error = %err, message_id = %event.message_id,
                    "storage failure, leaving message for redelivery");
                metrics::counter!("ingest_redelivered_total").increment(1);
                self.source.nack(delivery).await;
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, message_id = %event.message_id,
                    "fatal store error, halting ingestion");
                self.source.nack(delivery).await;
                Err(err.into())
            }
        }
    }
}

/// Spawns `count` ingest workers over one shared store and source.
pub fn spawn_workers<S, M>(
    store: Arc<S>,
    source: Arc<M>,
    updates: Option<mpsc::UnboundedSender<EventMessage>>,
    count: usize,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<Result<()>>>
where
    S: Store + 'static,
    M: MessageSource + 'static,
{
    (0..count)
        .map(|worker| {
            let mut ingestor = Ingestor::new(Arc::clone(&store), Arc::clone(&source));
            if let Some(updates) = &updates {
                ingestor = ingestor.with_updates(updates.clone());
            }
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let result = ingestor.run(shutdown).await;
                if let Err(ref err) = result {
                    tracing::error!(worker, error = %err, "ingest worker failed");
                }
                result
            })
        })
        .collect()
}
