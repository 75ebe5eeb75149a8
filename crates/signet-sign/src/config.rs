use serde::{Deserialize, Serialize};

/// Region signed into credentials when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// How the bucket is placed in the URL.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressingStyle {
    /// `https://endpoint/bucket/object`, as MinIO expects.
    #[default]
    Path,
    /// `https://bucket.endpoint/object`.
    VirtualHost,
}

/// Object store connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// `host[:port]`, or a full `http(s)://host[:port]` URL.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Scheme used when `endpoint` has none.
    pub use_ssl: bool,
    pub addressing: AddressingStyle,
    /// Sign against `endpoint` even when a reference names its own host.
    pub pin_endpoint: bool,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:9000".into(),
            access_key: String::new(),
            secret_key: String::new(),
            region: DEFAULT_REGION.into(),
            use_ssl: false,
            addressing: AddressingStyle::Path,
            pin_endpoint: false,
        }
    }
}

impl SignerConfig {
    pub fn new(
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("use_ssl", &self.use_ssl)
            .field("addressing", &self.addressing)
            .field("pin_endpoint", &self.pin_endpoint)
            .finish()
    }
}
