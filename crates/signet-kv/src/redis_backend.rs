//! Redis-backed cache shards.
//!
//! Every host in the configured list is one shard with its own connection
//! pool. A key always routes to the same shard (`blake3(key) % hosts`), so
//! batched lookups are split per shard, issued as one `MGET` each, and
//! stitched back into input order.

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::backend::{shard_index, KvBackend, Lookup, Miss, Namespace};
use crate::error::{KvError, KvResult};

struct Shard {
    host: String,
    pool: Pool,
}

/// Sharded Redis backend with one `deadpool-redis` pool per host.
pub struct RedisBackend {
    shards: Vec<Shard>,
}

impl RedisBackend {
    /// Build one pool per host and verify each host answers `PING`.
    ///
    /// Any unreachable host fails construction: the shard map is fixed
    /// by the host list, so a missing shard would silently reroute keys.
    pub async fn connect(hosts: &[String], pool_size: usize) -> KvResult<Self> {
        if hosts.is_empty() {
            return Err(KvError::Connection("no cache hosts configured".into()));
        }

        let mut shards = Vec::with_capacity(hosts.len());
        for host in hosts {
            let pool = Self::build_pool(host, pool_size)?;
            let mut conn = pool
                .get()
                .await
                .map_err(|e| KvError::Connection(format!("{host}: {e}")))?;
            let _: String = redis::cmd("PING")
                .query_async(&mut *conn)
                .await
                .map_err(|e| KvError::Connection(format!("{host}: {e}")))?;
            debug!(%host, "cache shard reachable");
            shards.push(Shard {
                host: host.clone(),
                pool,
            });
        }

        info!(shards = shards.len(), "redis cache backend connected");
        Ok(Self { shards })
    }

    fn build_pool(host: &str, pool_size: usize) -> KvResult<Pool> {
        let url = if host.contains("://") {
            host.to_string()
        } else {
            format!("redis://{host}")
        };
        let mut cfg = PoolConfig::from_url(url);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(pool_size.max(1)));
        cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| KvError::Connection(format!("{host}: {e}")))
    }

    /// Hosts in shard order.
    pub fn hosts(&self) -> Vec<&str> {
        self.shards.iter().map(|s| s.host.as_str()).collect()
    }

    fn shard_for(&self, qualified: &str) -> &Shard {
        &self.shards[shard_index(qualified, self.shards.len())]
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, ns: &Namespace, key: &str) -> KvResult<Option<String>> {
        let qualified = ns.qualify(key);
        let mut conn = self.shard_for(&qualified).pool.get().await?;
        let value: Option<String> = conn.get(&qualified).await?;
        Ok(value)
    }

    async fn put(&self, ns: &Namespace, key: &str, value: &str, ttl_secs: u32) -> KvResult<()> {
        let qualified = ns.qualify(key);
        let mut conn = self.shard_for(&qualified).pool.get().await?;
        if ttl_secs > 0 {
            let _: () = conn.set_ex(&qualified, value, u64::from(ttl_secs)).await?;
        } else {
            let _: () = conn.set(&qualified, value).await?;
        }
        Ok(())
    }

    async fn delete(&self, ns: &Namespace, key: &str) -> KvResult<bool> {
        let qualified = ns.qualify(key);
        let mut conn = self.shard_for(&qualified).pool.get().await?;
        let removed: i64 = conn.del(&qualified).await?;
        Ok(removed > 0)
    }

    async fn batch_get(&self, ns: &Namespace, keys: &[String]) -> KvResult<Vec<Lookup>> {
        let mut by_shard: Vec<Vec<(usize, String)>> = vec![Vec::new(); self.shards.len()];
        for (idx, key) in keys.iter().enumerate() {
            let qualified = ns.qualify(key);
            by_shard[shard_index(&qualified, self.shards.len())].push((idx, qualified));
        }

        let mut out: Vec<Lookup> = vec![Err(Miss::NotFound); keys.len()];
        for (shard, entries) in self.shards.iter().zip(by_shard) {
            if entries.is_empty() {
                continue;
            }
            let qualified: Vec<&str> = entries.iter().map(|(_, k)| k.as_str()).collect();
            let mut conn = shard.pool.get().await?;
            let values: Vec<Option<String>> = redis::cmd("MGET")
                .arg(&qualified)
                .query_async(&mut *conn)
                .await?;
            if values.len() != entries.len() {
                return Err(KvError::Backend(format!(
                    "MGET on {} returned {} values for {} keys",
                    shard.host,
                    values.len(),
                    entries.len()
                )));
            }
            for ((idx, _), value) in entries.into_iter().zip(values) {
                out[idx] = value.ok_or(Miss::NotFound);
            }
        }
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("hosts", &self.hosts())
            .finish()
    }
}
