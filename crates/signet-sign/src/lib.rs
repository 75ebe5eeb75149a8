//! Signed URL generation for Signet.
//!
//! [`SignedUrlGenerator`] turns an [`ObjectReference`](signet_types::ObjectReference)
//! into a time-limited download URL. Each attempt asks a [`SignerConnector`]
//! for a fresh [`ObjectSigner`]; the production connector builds an
//! [`S3Presigner`] that signs AWS SigV4 query strings locally, so no
//! network round-trip is needed to mint a URL.

pub mod config;
pub mod error;
pub mod generator;
pub mod presign;
pub mod retry;
pub mod signer;

pub use config::{AddressingStyle, SignerConfig, DEFAULT_REGION};
pub use error::{SignError, SignResult};
pub use generator::SignedUrlGenerator;
pub use presign::{effective_expiry, S3Presigner, MAX_EXPIRY, MIN_EXPIRY};
pub use retry::{Backoff, Retry, RetryExhausted};
pub use signer::{ObjectSigner, S3Connector, SignerConnector};
