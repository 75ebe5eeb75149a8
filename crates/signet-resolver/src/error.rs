use thiserror::Error;

/// Errors from token resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The token is neither a plain URL nor a decodable encoded token.
    #[error("invalid token: {0}")]
    InvalidToken(#[from] signet_types::CodecError),

    /// The decoded reference lacks a bucket or object.
    #[error("unresolvable reference: {0}")]
    Unresolvable(String),

    #[error("cache error: {0}")]
    Cache(#[from] signet_kv::KvError),

    #[error("signing error: {0}")]
    Sign(#[from] signet_sign::SignError),

    /// A generation task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

pub type ResolveResult<T> = Result<T, ResolveError>;
