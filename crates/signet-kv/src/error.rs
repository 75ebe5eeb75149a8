use thiserror::Error;

/// Errors from key-value store operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// The key failed `app|project|key` validation.
    #[error("format error: {0}")]
    Format(#[from] signet_types::CodecError),

    /// The backend could not be reached at construction time, or a pooled
    /// connection could not be checked out.
    #[error("connection error: {0}")]
    Connection(String),

    /// A single remote call failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// A remote call exceeded the configured per-operation timeout.
    #[error("operation timed out after {0} ms")]
    Timeout(u64),
}

impl From<redis::RedisError> for KvError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            Self::Connection(e.to_string())
        } else {
            Self::Backend(e.to_string())
        }
    }
}

impl From<deadpool_redis::PoolError> for KvError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        Self::Connection(e.to_string())
    }
}

/// Result alias for key-value store operations.
pub type KvResult<T> = Result<T, KvError>;
