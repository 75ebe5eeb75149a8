use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use signet_types::{ObjectReference, RequestParams};

use crate::config::SignerConfig;
use crate::error::{SignError, SignResult};
use crate::retry::{Backoff, Retry};
use crate::signer::{S3Connector, SignerConnector};

/// Mints signed download URLs for object references, retrying each
/// failure with a freshly connected signer.
#[derive(Clone)]
pub struct SignedUrlGenerator {
    connector: Arc<dyn SignerConnector>,
    retry: Retry,
}

impl SignedUrlGenerator {
    pub fn new(connector: Arc<dyn SignerConnector>) -> Self {
        Self {
            connector,
            retry: Retry::default(),
        }
    }

    /// Generator backed by [`S3Connector`].
    pub fn s3(config: SignerConfig) -> Self {
        Self::new(Arc::new(S3Connector::new(config)))
    }

    /// Total attempts per URL; non-positive values mean 1.
    pub fn with_attempts(mut self, attempts: i64) -> Self {
        self.retry = Retry::new(attempts).with_backoff(self.retry.backoff());
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.retry = self.retry.with_backoff(backoff);
        self
    }

    pub fn retry(&self) -> Retry {
        self.retry
    }

    /// Presign `object` for `expiry`, using the reference's own request
    /// parameters.
    pub async fn generate(&self, object: &ObjectReference, expiry: Duration) -> SignResult<String> {
        self.generate_with_params(object, expiry, &object.request_params)
            .await
    }

    /// Presign `object` for `expiry` with explicit request parameters.
    pub async fn generate_with_params(
        &self,
        object: &ObjectReference,
        expiry: Duration,
        params: &RequestParams,
    ) -> SignResult<String> {
        if !object.is_resolvable() {
            return Err(SignError::InvalidRequest(format!(
                "object reference needs bucket and object, got {object}"
            )));
        }

        let outcome = self
            .retry
            .run(|attempt| async move {
                let signer = self.connector.connect(&object.host, &object.region).await?;
                let url = signer
                    .presign_get(&object.bucket, &object.object, expiry, params)
                    .await?;
                debug!(attempt, bucket = %object.bucket, object = %object.object, "signed url generated");
                Ok::<_, SignError>(url)
            })
            .await;

        outcome.map_err(|exhausted| {
            warn!(
                attempts = exhausted.attempts,
                bucket = %object.bucket,
                object = %object.object,
                error = %exhausted.last,
                "signed url generation failed"
            );
            SignError::Generation {
                attempts: exhausted.attempts,
                last: exhausted.last.to_string(),
            }
        })
    }
}

impl std::fmt::Debug for SignedUrlGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedUrlGenerator")
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::ObjectSigner;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `fail_connects` connects, then signs deterministically.
    struct MockConnector {
        connects: AtomicU32,
        fail_connects: u32,
    }

    impl MockConnector {
        fn failing(n: u32) -> Arc<Self> {
            Arc::new(Self {
                connects: AtomicU32::new(0),
                fail_connects: n,
            })
        }
    }

    struct EchoSigner;

    #[async_trait]
    impl ObjectSigner for EchoSigner {
        async fn presign_get(
            &self,
            bucket: &str,
            object: &str,
            expiry: Duration,
            params: &RequestParams,
        ) -> SignResult<String> {
            Ok(format!(
                "https://signed/{bucket}/{object}?exp={}&params={}",
                expiry.as_secs(),
                params.len()
            ))
        }
    }

    #[async_trait]
    impl SignerConnector for MockConnector {
        async fn connect(&self, _host: &str, _region: &str) -> SignResult<Arc<dyn ObjectSigner>> {
            let n = self.connects.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_connects {
                Err(SignError::Connection(format!("connect #{n} refused")))
            } else {
                Ok(Arc::new(EchoSigner))
            }
        }
    }

    fn object() -> ObjectReference {
        ObjectReference::new("photos", "/a.png")
    }

    #[tokio::test]
    async fn first_attempt_success() {
        let connector = MockConnector::failing(0);
        let gen = SignedUrlGenerator::new(connector.clone());
        let url = gen.generate(&object(), Duration::from_secs(3600)).await.unwrap();
        assert_eq!(url, "https://signed/photos//a.png?exp=3600&params=0");
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reconnects_on_each_retry() {
        let connector = MockConnector::failing(2);
        let gen = SignedUrlGenerator::new(connector.clone()).with_attempts(3);
        assert!(gen.generate(&object(), Duration::from_secs(60)).await.is_ok());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_attempts_surface_last_error() {
        let connector = MockConnector::failing(10);
        let gen = SignedUrlGenerator::new(connector.clone()).with_attempts(2);
        let err = gen.generate(&object(), Duration::from_secs(60)).await.unwrap_err();
        match err {
            SignError::Generation { attempts, last } => {
                assert_eq!(attempts, 2);
                assert!(last.contains("connect #1 refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let connector = MockConnector::failing(0);
        let gen = SignedUrlGenerator::new(connector.clone()).with_attempts(0);
        assert!(gen.generate(&object(), Duration::from_secs(60)).await.is_ok());
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unresolvable_reference_never_connects() {
        let connector = MockConnector::failing(0);
        let gen = SignedUrlGenerator::new(connector.clone());
        let err = gen
            .generate(&ObjectReference::new("", "/a.png"), Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, SignError::InvalidRequest(_)));
        assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn explicit_params_override_reference_params() {
        let gen = SignedUrlGenerator::new(MockConnector::failing(0));
        let mut params = RequestParams::new();
        params.insert("a".into(), vec!["1".into()]);
        params.insert("b".into(), vec!["2".into()]);
        let url = gen
            .generate_with_params(&object(), Duration::from_secs(5), &params)
            .await
            .unwrap();
        assert!(url.ends_with("params=2"));
    }

    #[tokio::test]
    async fn s3_generator_signs_against_config_endpoint() {
        let gen = SignedUrlGenerator::s3(SignerConfig::new("minio.local:9000", "AKID", "secret"));
        let url = gen
            .generate(&ObjectReference::new("photos", "a.png"), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("http://minio.local:9000/photos/a.png?X-Amz-Algorithm="));
    }
}
