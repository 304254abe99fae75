//! Read facade for UI collaborators.
//!
//! Every request carries a [`CallerScope`]: customers see the shared parking
//! inventory plus their own vehicles, sessions, and citations; staff see
//! everything and control recomputation. Query results are paginated and
//! tagged with the store version they were read at. Store failures are logged
//! here and surfaced to callers as a generic [`QueryError::Unavailable`].

mod error;
mod scope;
mod service;

pub use error::{QueryError, Result};
pub use scope::CallerScope;
pub use service::{Page, QueryCriteria, QueryService, RecommendationReply};
