use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use signet_kv::KvConfig;
use signet_resolver::ResolverConfig;
use signet_sign::SignerConfig;

use crate::error::{ServerError, ServerResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
        }
    }
}

/// Everything a Signet process needs, as read from one TOML file with
/// `[kv]`, `[signer]`, `[resolver]` and `[server]` tables. Missing tables
/// and keys take their defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignetConfig {
    pub kv: KvConfig,
    pub signer: SignerConfig,
    pub resolver: ResolverConfig,
    pub server: ServerConfig,
}

impl SignetConfig {
    pub fn from_toml_str(s: &str) -> ServerResult<Self> {
        toml::from_str(s).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signet_kv::BackendKind;
    use signet_sign::AddressingStyle;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let c = SignetConfig::from_toml_str("").unwrap();
        assert_eq!(c.kv.backend, BackendKind::Memory);
        assert_eq!(c.resolver, ResolverConfig::default());
        assert_eq!(c.server, ServerConfig::default());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[kv]
service = "aerospike.stock.packer"
backend = "redis"
hosts = ["10.0.0.1:6379", "10.0.0.2:6379"]

[signer]
endpoint = "https://minio.internal"
access_key = "AKID"
secret_key = "secret"
addressing = "virtual-host"

[resolver]
expiry_secs = 600

[server]
bind_addr = "0.0.0.0:9000"
"#
        )
        .unwrap();

        let c = SignetConfig::load(file.path()).unwrap();
        assert_eq!(c.kv.backend, BackendKind::Redis);
        assert_eq!(c.kv.hosts.len(), 2);
        assert_eq!(c.kv.set_name(), "aerospike__stock__packer");
        assert_eq!(c.signer.addressing, AddressingStyle::VirtualHost);
        assert_eq!(c.resolver.expiry_secs, 600);
        assert_eq!(c.resolver.app_id, "1000");
        assert_eq!(c.server.bind_addr.port(), 9000);
    }

    #[test]
    fn bad_toml_is_config_error() {
        assert!(matches!(
            SignetConfig::from_toml_str("[kv\nbackend ="),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SignetConfig::load(dir.path().join("absent.toml")),
            Err(ServerError::Io(_))
        ));
    }
}
