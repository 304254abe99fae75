//! Recommendation engine for free parking spaces.
//!
//! The engine reads snapshots from the entity [`store`], scores free spaces
//! per zone with a pluggable [`ScoringStrategy`], and publishes the result as
//! an immutable [`RecommendationSet`] swapped in atomically. Lookups via
//! [`Recommender::recommend`] never wait on a recomputation in progress; they
//! serve the latest published set, which may lag the store.
//!
//! Two refresh paths exist and converge on the same answer:
//! - [`Recommender::full_recompute`] rebuilds every zone from one snapshot,
//! - [`Recommender::apply_event`] refreshes only the zones an applied event
//!   touched.

mod engine;
mod error;
mod records;
mod scoring;

pub use engine::{Recommender, RecomputeStatus, spawn_periodic_recompute};
pub use error::{RecommenderError, Result};
pub use records::{RecommendationRecord, RecommendationSet, ScoredSpace};
pub use scoring::{CitationAvoidance, RecencyWeighted, ScoringStrategy, SpaceStats};
