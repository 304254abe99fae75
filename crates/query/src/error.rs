//! Errors surfaced to query callers.

use thiserror::Error;

/// Caller-facing query errors.
///
/// Storage detail is deliberately absent: backend failures are logged at the
/// service layer and collapsed into [`QueryError::Unavailable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The backing store could not serve the request.
    #[error("service temporarily unavailable")]
    Unavailable,

    /// The caller's scope does not permit this operation.
    #[error("operation not permitted for this caller")]
    Forbidden,
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
