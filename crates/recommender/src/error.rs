//! Error types for the recommendation engine.

use thiserror::Error;

/// Errors that can occur while computing recommendations.
#[derive(Debug, Error)]
pub enum RecommenderError {
    /// The underlying entity store failed.
    #[error("store error: {0}")]
    Store(#[from] store::StoreError),
}

/// Result type for recommender operations.
pub type Result<T> = std::result::Result<T, RecommenderError>;
