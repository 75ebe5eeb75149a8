//! AWS Signature Version 4 query-string presigning.
//!
//! Produces `GET` URLs for S3-compatible stores (S3, MinIO) that carry
//! their own credentials scope and signature, valid for a bounded time.
//! Only the `host` header is signed and the payload is `UNSIGNED-PAYLOAD`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use url::Url;

use signet_types::RequestParams;

use crate::config::{AddressingStyle, SignerConfig};
use crate::error::{SignError, SignResult};
use crate::signer::ObjectSigner;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Shortest expiry S3 accepts.
pub const MIN_EXPIRY: Duration = Duration::from_secs(1);
/// Longest expiry S3 accepts (7 days).
pub const MAX_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The lifetime a presigned URL actually gets for a requested `expiry`.
pub fn effective_expiry(expiry: Duration) -> Duration {
    expiry.clamp(MIN_EXPIRY, MAX_EXPIRY)
}

/// SigV4 presigner bound to one endpoint and one set of credentials.
#[derive(Clone)]
pub struct S3Presigner {
    scheme: String,
    host: String,
    access_key: String,
    secret_key: String,
    region: String,
    addressing: AddressingStyle,
}

impl S3Presigner {
    /// Validate `config` and build a presigner.
    pub fn from_config(config: &SignerConfig) -> SignResult<Self> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(SignError::Connection("missing access or secret key".into()));
        }

        let raw = if config.endpoint.contains("://") {
            config.endpoint.clone()
        } else {
            let scheme = if config.use_ssl { "https" } else { "http" };
            format!("{scheme}://{}", config.endpoint)
        };
        let url = Url::parse(&raw)
            .map_err(|e| SignError::Connection(format!("endpoint {raw:?}: {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SignError::Connection(format!(
                "endpoint {raw:?}: scheme must be http or https"
            )));
        }
        if !matches!(url.path(), "" | "/") || url.query().is_some() {
            return Err(SignError::Connection(format!(
                "endpoint {raw:?} must not carry a path or query"
            )));
        }
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(port)) => format!("{h}:{port}"),
            (Some(h), None) => h.to_string(),
            (None, _) => return Err(SignError::Connection(format!("endpoint {raw:?} has no host"))),
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            region: if config.region.is_empty() {
                crate::config::DEFAULT_REGION.to_string()
            } else {
                config.region.clone()
            },
            addressing: config.addressing,
        })
    }

    /// `scheme://host[:port]` of the endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Presign a `GET` for `bucket`/`object` as of `now`. Leading slashes
    /// on `object` are not part of the key.
    pub fn presign_get_at(
        &self,
        bucket: &str,
        object: &str,
        expiry: Duration,
        params: &RequestParams,
        now: DateTime<Utc>,
    ) -> SignResult<String> {
        let object = object.trim_start_matches('/');
        if bucket.is_empty() || object.is_empty() {
            return Err(SignError::InvalidRequest(format!(
                "bucket and object are required (bucket={bucket:?}, object={object:?})"
            )));
        }

        let expires = effective_expiry(expiry).as_secs();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);

        let (host, path) = match self.addressing {
            AddressingStyle::Path => (
                self.host.clone(),
                format!("/{}/{}", uri_encode(bucket, true), uri_encode(object, false)),
            ),
            AddressingStyle::VirtualHost => (
                format!("{bucket}.{}", self.host),
                format!("/{}", uri_encode(object, false)),
            ),
        };

        let mut query: Vec<(String, String)> = vec![
            ("X-Amz-Algorithm".into(), ALGORITHM.into()),
            (
                "X-Amz-Credential".into(),
                format!("{}/{scope}", self.access_key),
            ),
            ("X-Amz-Date".into(), amz_date.clone()),
            ("X-Amz-Expires".into(), expires.to_string()),
            ("X-Amz-SignedHeaders".into(), "host".into()),
        ];
        for (name, values) in params {
            for value in values {
                query.push((name.clone(), value.clone()));
            }
        }
        let canonical_query = canonical_query_string(&query);

        let canonical_request = format!(
            "GET\n{path}\n{canonical_query}\nhost:{host}\n\nhost\n{UNSIGNED_PAYLOAD}"
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = self.signing_key(&date)?;
        let signature = hex::encode(hmac(&signing_key, string_to_sign.as_bytes())?);

        Ok(format!(
            "{}://{host}{path}?{canonical_query}&X-Amz-Signature={signature}",
            self.scheme
        ))
    }

    fn signing_key(&self, date: &str) -> SignResult<Vec<u8>> {
        let k_date = hmac(format!("AWS4{}", self.secret_key).as_bytes(), date.as_bytes())?;
        let k_region = hmac(&k_date, self.region.as_bytes())?;
        let k_service = hmac(&k_region, SERVICE.as_bytes())?;
        hmac(&k_service, b"aws4_request")
    }
}

#[async_trait]
impl ObjectSigner for S3Presigner {
    async fn presign_get(
        &self,
        bucket: &str,
        object: &str,
        expiry: Duration,
        params: &RequestParams,
    ) -> SignResult<String> {
        self.presign_get_at(bucket, object, expiry, params, Utc::now())
    }
}

impl std::fmt::Debug for S3Presigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Presigner")
            .field("endpoint", &self.endpoint())
            .field("region", &self.region)
            .field("addressing", &self.addressing)
            .finish()
    }
}

fn hmac(key: &[u8], data: &[u8]) -> SignResult<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| SignError::Signing(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Sorted `k=v` pairs joined by `&`, both sides URI-encoded.
fn canonical_query_string(pairs: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// SigV4 URI encoding: unreserved characters pass through, everything
/// else becomes `%XX`. `/` is kept when `encode_slash` is false.
fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
