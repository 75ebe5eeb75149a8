use thiserror::Error;

/// Errors produced while encoding, decoding, or validating references and keys.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The string is not framed as an encoded token.
    #[error("invalid token framing: {0}")]
    InvalidToken(String),

    /// The token payload did not deserialize into an object reference.
    #[error("invalid token payload: {0}")]
    InvalidPayload(String),

    /// The cache key does not follow the `app|project|key` pattern.
    #[error("invalid cache key {key:?}: {reason}")]
    InvalidCacheKey { key: String, reason: String },

    /// The URL could not be split into host, bucket, and object.
    #[error("invalid object url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CodecError {
    /// Returns `true` for errors caused by malformed caller input.
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Self::InvalidToken(_) | Self::InvalidPayload(_) | Self::InvalidCacheKey { .. }
        )
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
