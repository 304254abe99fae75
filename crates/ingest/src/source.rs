//! Message source abstraction with explicit ack/nack.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

/// One message pulled from a source, owned until acked or nacked.
#[derive(Debug)]
pub struct Delivery {
    pub payload: Vec<u8>,
}

/// A queue of raw broker messages with at-least-once semantics.
///
/// `ack` and `nack` take the delivery by value so a message cannot be settled
/// twice. A nacked message is redelivered to a later `receive`.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Waits for the next message. Returns `None` once the source is closed
    /// and drained.
    async fn receive(&self) -> Option<Delivery>;

    /// Settles the delivery as done; it will not be seen again.
    async fn ack(&self, delivery: Delivery);

    /// Returns the delivery for redelivery.
    async fn nack(&self, delivery: Delivery);
}

/// In-memory message source backed by a deque.
///
/// Stands in for the broker transport in tests and in the server binary's
/// inbound seam. Nacked messages go back to the front of the queue, which
/// mirrors broker redelivery closely enough for the ingestor's contract.
#[derive(Default)]
pub struct ChannelSource {
    queue: Mutex<VecDeque<Vec<u8>>>,
    notify: Notify,
    closed: AtomicBool,
}

impl ChannelSource {
    /// Creates a new open, empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a raw payload. Returns `false` if the source is closed.
    pub async fn publish(&self, payload: impl Into<Vec<u8>>) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.queue.lock().await.push_back(payload.into());
        self.notify.notify_one();
        true
    }

    /// Closes the source. Queued messages can still be received.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Number of messages currently queued (pending or redelivered).
    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Whether the queue is currently empty.
    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    async fn receive(&self) -> Option<Delivery> {
        loop {
            {
                let mut queue = self.queue.lock().await;
                if let Some(payload) = queue.pop_front() {
                    return Some(Delivery { payload });
                }
            }
            if self.closed.load(Ordering::Acquire) {
                return None;
            }
            // notify_one stores a permit, so a publish racing with this
            // await is not lost.
            self.notify.notified().await;
        }
    }

    async fn ack(&self, delivery: Delivery) {
        // The message was removed from the queue at receive time.
        drop(delivery);
    }

    async fn nack(&self, delivery: Delivery) {
        self.queue.lock().await.push_front(delivery.payload);
        self.notify.notify_one();
    }
}
