use std::fmt;

use async_trait::async_trait;

use crate::error::KvResult;

/// Why a single key in a batch produced no value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Miss {
    /// The key is absent or expired.
    NotFound,
    /// The record exists but could not be read as a string value.
    Failed(String),
}

/// Per-key outcome of a batched lookup.
pub type Lookup = Result<String, Miss>;

/// Namespace and set a store's records live under.
///
/// Backends qualify every user key as `<namespace>:<set>:<key>` so that
/// several stores can share one physical cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Namespace {
    pub namespace: String,
    pub set: String,
}

impl Namespace {
    pub fn new(namespace: impl Into<String>, set: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
        }
    }

    /// Fully qualified record key.
    pub fn qualify(&self, key: &str) -> String {
        format!("{}:{}:{}", self.namespace, self.set, key)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.set)
    }
}

/// Remote (or in-process) cache backend.
///
/// Implementations must be safe to share across tasks: one handle is
/// created per process and every caller uses it concurrently. Keys passed
/// in are already validated by [`KeyValueStore`](crate::KeyValueStore).
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Point lookup. `Ok(None)` if the key is absent or expired.
    async fn get(&self, ns: &Namespace, key: &str) -> KvResult<Option<String>>;

    /// Unconditional upsert. A `ttl_secs` of 0 means the entry never expires.
    async fn put(&self, ns: &Namespace, key: &str, value: &str, ttl_secs: u32) -> KvResult<()>;

    /// Remove a key. Returns `true` if it existed.
    async fn delete(&self, ns: &Namespace, key: &str) -> KvResult<bool>;

    /// Look up many keys in one round trip.
    ///
    /// On success the result has exactly one entry per input key, in
    /// input order. `Err` means the whole call failed.
    async fn batch_get(&self, ns: &Namespace, keys: &[String]) -> KvResult<Vec<Lookup>>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Pick one of `shards` for `key`. Stable across processes.
pub(crate) fn shard_index(key: &str, shards: usize) -> usize {
    if shards <= 1 {
        return 0;
    }
    let hash = blake3::hash(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    (u64::from_le_bytes(head) % shards as u64) as usize
}
