use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::Namespace;

/// Hosts used when neither the config nor the environment lists any.
/// A bootstrap default for local runs, not a production contract.
pub const FALLBACK_HOSTS: &[&str] = &["127.0.0.1:6379"];

/// Namespace records are stored under unless configured otherwise.
pub const DEFAULT_NAMESPACE: &str = "wealth";

/// Which backend [`KeyValueStore::connect`](crate::KeyValueStore::connect) builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Memory,
    Redis,
}

/// Key-value store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct KvConfig {
    /// Service identifier, e.g. `aerospike.stock.packer`. Drives host
    /// discovery and the default set name.
    pub service: String,
    /// Namespace records live under.
    pub namespace: String,
    /// Set (table) name. Derived from `service` when absent.
    pub set: Option<String>,
    /// Explicit host list. Empty means "discover from the environment".
    pub hosts: Vec<String>,
    pub backend: BackendKind,
    /// Shard count for the in-memory backend.
    pub memory_shards: usize,
    /// Pooled connections per host for the redis backend.
    pub pool_size: usize,
    /// Per-operation timeout in milliseconds. 0 disables it.
    pub op_timeout_ms: u64,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            service: "signet.url.cache".into(),
            namespace: DEFAULT_NAMESPACE.into(),
            set: None,
            hosts: Vec::new(),
            backend: BackendKind::Memory,
            memory_shards: crate::memory::DEFAULT_MEMORY_SHARDS,
            pool_size: 16,
            op_timeout_ms: 0,
        }
    }
}

impl KvConfig {
    /// Config for `service` with every other field defaulted.
    pub fn for_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Default::default()
        }
    }

    /// The set name: explicit, or the service name with `.` replaced by `__`.
    pub fn set_name(&self) -> String {
        match &self.set {
            Some(set) if !set.is_empty() => set.clone(),
            _ => self.service.replace('.', "__"),
        }
    }

    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.namespace.clone(), self.set_name())
    }

    /// Explicit hosts if configured, otherwise `<SERVICE>.HOSTS` from the
    /// environment, otherwise [`FALLBACK_HOSTS`].
    pub fn resolved_hosts(&self) -> Vec<String> {
        if !self.hosts.is_empty() {
            return self.hosts.clone();
        }
        let raw = std::env::var(hosts_env_var(&self.service)).ok();
        parse_hosts(raw.as_deref())
    }

    pub fn op_timeout(&self) -> Option<Duration> {
        (self.op_timeout_ms > 0).then(|| Duration::from_millis(self.op_timeout_ms))
    }
}

/// Environment variable listing hosts for `service`: the uppercased
/// service name suffixed with `.HOSTS`.
pub fn hosts_env_var(service: &str) -> String {
    format!("{}.HOSTS", service.to_uppercase())
}

/// Split a comma-separated host list, dropping blank entries. Absent or
/// blank input yields [`FALLBACK_HOSTS`].
pub fn parse_hosts(raw: Option<&str>) -> Vec<String> {
    let hosts: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(String::from)
        .collect();
    if hosts.is_empty() {
        FALLBACK_HOSTS.iter().map(|h| h.to_string()).collect()
    } else {
        hosts
    }
}
