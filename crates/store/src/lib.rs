//! Durable, query-able persistence of domain records.
//!
//! The store is the single source of truth: the ingestor is its only writer,
//! and every apply is idempotent (keyed by message ID) and ordered per entity
//! key by the event's sequence hint. A monotonic watermark advances once per
//! logically-distinct applied message and tags every query snapshot, so
//! derived data can detect staleness.
//!
//! Two implementations share the [`Store`] contract:
//! - [`InMemoryStore`] for tests and embedders,
//! - [`SqliteStore`] backed by the embedded relational engine via sqlx.

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use store::{ApplyOutcome, EntityFilter, Store, Versioned};
