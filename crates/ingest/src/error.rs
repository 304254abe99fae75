use thiserror::Error;

/// Errors that escalate out of an ingest worker.
///
/// Retryable storage failures and malformed payloads are handled inside the
/// worker (nack respectively ack-and-drop); only fatal store errors surface
/// here and halt the worker.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The store reported a non-retryable failure.
    #[error("fatal store error: {0}")]
    Store(#[from] store::StoreError),
}

/// Result type for ingest operations.
pub type Result<T> = std::result::Result<T, IngestError>;
