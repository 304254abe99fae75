//! Event ingestion from the broker into the store.
//!
//! Broker consumption is reframed as worker tasks pulling from a
//! [`MessageSource`] with explicit ack/nack, so the pipeline is testable
//! without a live broker: the in-memory [`ChannelSource`] stands in for the
//! AMQP transport. Each message moves through
//! `Received → Validated → Applied | Rejected`:
//! malformed payloads are acknowledged and dropped (never retried), store
//! application is idempotent, and a message is only acknowledged after its
//! apply is durable, so at-least-once redelivery is harmless.

pub mod error;
pub mod ingestor;
pub mod source;
pub mod validate;

pub use error::{IngestError, Result};
pub use ingestor::{Ingestor, spawn_workers};
pub use source::{ChannelSource, Delivery, MessageSource};
pub use validate::{ValidationError, validate};
