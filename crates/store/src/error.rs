use thiserror::Error;

/// Errors signaled by the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A transient failure in the underlying engine. Callers may retry;
    /// the ingestor leaves the message unacknowledged for redelivery.
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    /// Persisted state could not be decoded. Fatal: ingestion for the
    /// affected partition must halt and an operator intervene.
    #[error("store corrupt: {0}")]
    Corrupt(String),

    /// An entity or event could not be serialized for persistence.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether a caller may retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Storage(_))
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
