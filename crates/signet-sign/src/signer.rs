use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use signet_types::RequestParams;

use crate::config::SignerConfig;
use crate::error::SignResult;
use crate::presign::S3Presigner;

/// Something that can mint a time-limited download URL for an object.
#[async_trait]
pub trait ObjectSigner: Send + Sync {
    /// Presign a `GET` for `bucket`/`object`, valid for `expiry`.
    async fn presign_get(
        &self,
        bucket: &str,
        object: &str,
        expiry: Duration,
        params: &RequestParams,
    ) -> SignResult<String>;
}

/// Builds an [`ObjectSigner`] for a given endpoint.
///
/// The generator asks for a fresh signer on every attempt, so a broken
/// client is never reused after a failure.
#[async_trait]
pub trait SignerConnector: Send + Sync {
    async fn connect(&self, host: &str, region: &str) -> SignResult<Arc<dyn ObjectSigner>>;
}

/// Connects [`S3Presigner`]s using shared credentials.
///
/// An empty `host` or `region` falls back to the configured endpoint and
/// region. A non-empty `host` replaces the endpoint, so a token's own host
/// decides where the URL points and which host the credentials sign for.
/// Set [`SignerConfig::pin_endpoint`] when tokens come from untrusted
/// callers.
#[derive(Clone, Debug)]
pub struct S3Connector {
    config: SignerConfig,
}

impl S3Connector {
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignerConfig {
        &self.config
    }
}

#[async_trait]
impl SignerConnector for S3Connector {
    async fn connect(&self, host: &str, region: &str) -> SignResult<Arc<dyn ObjectSigner>> {
        let mut config = self.config.clone();
        if !host.is_empty() && !config.pin_endpoint {
            config.endpoint = host.to_string();
        }
        if !region.is_empty() {
            config.region = region.to_string();
        }
        Ok(Arc::new(S3Presigner::from_config(&config)?))
    }
}
