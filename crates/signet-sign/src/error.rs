use thiserror::Error;

/// Errors from signed URL generation.
#[derive(Debug, Error)]
pub enum SignError {
    /// A signer client could not be built (bad endpoint, missing credentials).
    #[error("connection error: {0}")]
    Connection(String),

    /// The request cannot be signed as given.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A single signing attempt failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Every retry attempt failed.
    #[error("signed url generation failed after {attempts} attempt(s): {last}")]
    Generation { attempts: u32, last: String },
}

/// Result alias for signing operations.
pub type SignResult<T> = Result<T, SignError>;
