use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::backend::{shard_index, KvBackend, Lookup, Miss, Namespace};
use crate::error::KvResult;

/// Default number of shards for [`MemoryBackend::new`].
pub const DEFAULT_MEMORY_SHARDS: usize = 16;

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// In-process, sharded, TTL-aware backend.
///
/// Intended for tests, single-node deployments, and embedding. Each key
/// hashes to one of N `RwLock<HashMap>` shards so unrelated keys do not
/// contend. Expired entries read as absent and are removed lazily.
pub struct MemoryBackend {
    shards: Vec<RwLock<HashMap<String, Entry>>>,
}

impl MemoryBackend {
    /// Create a backend with [`DEFAULT_MEMORY_SHARDS`] shards.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_MEMORY_SHARDS)
    }

    /// Create a backend with `shards` shards (at least one).
    pub fn with_shards(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Number of live entries across all shards.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.shards
            .iter()
            .map(|s| {
                s.read()
                    .expect("lock poisoned")
                    .values()
                    .filter(|e| e.is_live(now))
                    .count()
            })
            .sum()
    }

    /// Returns `true` if no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut map = shard.write().expect("lock poisoned");
            let before = map.len();
            map.retain(|_, e| e.is_live(now));
            removed += before - map.len();
        }
        removed
    }

    /// Remove all entries.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.write().expect("lock poisoned").clear();
        }
    }

    fn shard(&self, qualified: &str) -> &RwLock<HashMap<String, Entry>> {
        &self.shards[shard_index(qualified, self.shards.len())]
    }

    fn read_live(&self, qualified: &str) -> Option<String> {
        let now = Instant::now();
        let shard = self.shard(qualified);
        {
            let map = shard.read().expect("lock poisoned");
            match map.get(qualified) {
                None => return None,
                Some(e) if e.is_live(now) => return Some(e.value.clone()),
                Some(_) => {}
            }
        }
        // Expired: remove unless a writer refreshed it in between.
        let mut map = shard.write().expect("lock poisoned");
        if map.get(qualified).is_some_and(|e| !e.is_live(now)) {
            map.remove(qualified);
        }
        None
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, ns: &Namespace, key: &str) -> KvResult<Option<String>> {
        Ok(self.read_live(&ns.qualify(key)))
    }

    async fn put(&self, ns: &Namespace, key: &str, value: &str, ttl_secs: u32) -> KvResult<()> {
        let qualified = ns.qualify(key);
        let expires_at =
            (ttl_secs > 0).then(|| Instant::now() + Duration::from_secs(u64::from(ttl_secs)));
        self.shard(&qualified).write().expect("lock poisoned").insert(
            qualified,
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, ns: &Namespace, key: &str) -> KvResult<bool> {
        let qualified = ns.qualify(key);
        let removed = self
            .shard(&qualified)
            .write()
            .expect("lock poisoned")
            .remove(&qualified);
        Ok(removed.is_some_and(|e| e.is_live(Instant::now())))
    }

    async fn batch_get(&self, ns: &Namespace, keys: &[String]) -> KvResult<Vec<Lookup>> {
        Ok(keys
            .iter()
            .map(|k| self.read_live(&ns.qualify(k)).ok_or(Miss::NotFound))
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("shards", &self.shards.len())
            .field("entries", &self.len())
            .finish()
    }
}
