//! Cache tier error types.

use thiserror::Error;

/// Failure of a transaction-cache tier. Callers treat every variant as a
/// degradation, never as a reason to fail the payment operation.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Pool or connection-level failure (Redis unreachable, pool timeout).
    #[error("cache connection error: {0}")]
    Connection(String),

    /// A cached entry could not be encoded or decoded.
    #[error("cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A Redis command was rejected or interrupted.
    #[error("cache command failed: {0}")]
    Command(#[from] redis::RedisError),
}

impl From<bb8::RunError<redis::RedisError>> for CacheError {
    fn from(err: bb8::RunError<redis::RedisError>) -> Self {
        CacheError::Connection(err.to_string())
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
