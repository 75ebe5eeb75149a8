use std::time::Duration;

use serde::{Deserialize, Serialize};

use signet_kv::DEFAULT_BATCH_SIZE;
use signet_types::{CacheKey, ObjectReference};

/// Resolver settings: the cache key template and per-request defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// First key segment.
    pub app_id: String,
    /// Second key segment.
    pub project: String,
    /// Prepended to the per-object subkey, separated by `.`.
    pub prefix: String,
    /// Signed URL lifetime when the caller does not give one.
    pub expiry_secs: u64,
    /// Generation attempts per cache miss.
    pub retry_attempts: i64,
    /// Keys per batch group.
    pub batch_size: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            app_id: "1000".into(),
            project: "packer".into(),
            prefix: "article".into(),
            expiry_secs: 24 * 60 * 60,
            retry_attempts: 3,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ResolverConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    /// `app_id|project|prefix.<subkey>` for `reference`.
    pub fn cache_key(&self, reference: &ObjectReference) -> CacheKey {
        let subkey = reference.cache_subkey();
        let last = if self.prefix.is_empty() {
            subkey
        } else {
            format!("{}.{subkey}", self.prefix)
        };
        CacheKey::from_parts(&self.app_id, &self.project, &last)
    }
}

/// Whole seconds a generated URL is cached for: half its validity, so a
/// cached URL is always replaced well before its signature expires.
pub fn cache_ttl_secs(expiry: Duration) -> u32 {
    (expiry.as_secs() / 2).min(u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_key_template() {
        let r = ObjectReference::new("photos", "/a.png").with_host("oss.local");
        let key = ResolverConfig::default().cache_key(&r);
        assert_eq!(key.as_str(), "1000|packer|article.hoss.local.bphotos.o/a.png");
    }

    #[test]
    fn empty_prefix_uses_bare_subkey() {
        let config = ResolverConfig {
            prefix: String::new(),
            ..Default::default()
        };
        let key = config.cache_key(&ObjectReference::new("b", "o"));
        assert_eq!(key.as_str(), "1000|packer|h.bb.oo");
    }

    #[test]
    fn ttl_is_half_expiry_floored() {
        assert_eq!(cache_ttl_secs(Duration::from_secs(3600)), 1800);
        assert_eq!(cache_ttl_secs(Duration::from_secs(7)), 3);
        assert_eq!(cache_ttl_secs(Duration::from_millis(1999)), 0);
        assert_eq!(cache_ttl_secs(Duration::ZERO), 0);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ResolverConfig = toml::from_str("project = \"stock\"\nbatch_size = 50").unwrap();
        assert_eq!(config.project, "stock");
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.app_id, "1000");
        assert_eq!(config.retry_attempts, 3);
    }
}
