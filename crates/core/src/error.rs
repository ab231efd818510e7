use thiserror::Error;

/// Failure classification for a persistence write.
///
/// Fatal variants abandon the batch without retry; retryable failures are
/// retried with exponential backoff up to the configured cap.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Authentication or authorization rejected by the store (HTTP 401/403).
    #[error("store rejected credentials: {0}")]
    Unauthorized(String),

    /// Destination bucket does not exist (HTTP 404).
    #[error("destination bucket not found: {0}")]
    BucketNotFound(String),

    /// Transient failure: network error, timeout, or server-side error.
    #[error("retryable store failure: {0}")]
    Retryable(String),
}

impl WriteError {
    /// True when retrying the same batch cannot succeed.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WriteError::Retryable(_))
    }
}
