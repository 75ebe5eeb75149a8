use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use signet_types::validate_cache_key;

use crate::backend::{KvBackend, Namespace};
use crate::batch::{fetch_batched, BatchPlan};
use crate::config::{BackendKind, KvConfig};
use crate::error::{KvError, KvResult};
use crate::memory::MemoryBackend;
use crate::redis_backend::RedisBackend;

/// Namespaced key-value client.
///
/// Wraps one shared backend handle. The store is cheap to clone and every
/// clone uses the same handle, so construct it once per process and pass
/// it to whoever needs it. All operations validate the key first and
/// reject malformed keys with [`KvError::Format`].
#[derive(Clone)]
pub struct KeyValueStore {
    backend: Arc<dyn KvBackend>,
    namespace: Arc<Namespace>,
    op_timeout: Option<Duration>,
}

impl KeyValueStore {
    /// Wrap an already constructed backend.
    pub fn new(backend: Arc<dyn KvBackend>, namespace: Namespace) -> Self {
        Self {
            backend,
            namespace: Arc::new(namespace),
            op_timeout: None,
        }
    }

    /// In-memory store, mainly for tests and local runs.
    pub fn in_memory(namespace: Namespace) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), namespace)
    }

    /// Build the backend described by `config`.
    ///
    /// Fails with [`KvError::Connection`] if the backend cannot be reached;
    /// the store is unusable without one.
    pub async fn connect(config: &KvConfig) -> KvResult<Self> {
        let namespace = config.namespace();
        let backend: Arc<dyn KvBackend> = match config.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::with_shards(config.memory_shards)),
            BackendKind::Redis => {
                let hosts = config.resolved_hosts();
                info!(service = %config.service, ?hosts, "connecting cache backend");
                Arc::new(RedisBackend::connect(&hosts, config.pool_size).await?)
            }
        };
        info!(backend = backend.name(), %namespace, "key-value store ready");
        Ok(Self::new(backend, namespace).with_op_timeout(config.op_timeout()))
    }

    /// Bound every remote call by `timeout`.
    pub fn with_op_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Point lookup. Returns an empty string when the key is absent.
    pub async fn get(&self, key: &str) -> KvResult<String> {
        validate_cache_key(key)?;
        let value = self.bounded(self.backend.get(&self.namespace, key)).await?;
        Ok(value.unwrap_or_default())
    }

    /// Synchronous upsert with a TTL in seconds (0 never expires).
    pub async fn put(&self, key: &str, value: &str, ttl_secs: u32) -> KvResult<()> {
        validate_cache_key(key)?;
        self.bounded(self.backend.put(&self.namespace, key, value, ttl_secs))
            .await
    }

    /// Fire-and-forget upsert.
    ///
    /// The key is validated before anything is spawned. The write itself
    /// runs on its own task; any error or panic inside it is logged there
    /// and never reaches the caller, and it is not retried. The returned
    /// handle may be dropped.
    pub fn put_async(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
        ttl_secs: u32,
    ) -> KvResult<JoinHandle<()>> {
        let key = key.into();
        validate_cache_key(&key)?;
        let runtime = Handle::try_current()
            .map_err(|e| KvError::Backend(format!("put_async needs a tokio runtime: {e}")))?;

        let store = self.clone();
        let value = value.into();
        Ok(runtime.spawn(async move {
            let write = store.bounded(store.backend.put(&store.namespace, &key, &value, ttl_secs));
            match AssertUnwindSafe(write).catch_unwind().await {
                Ok(Ok(())) => debug!(%key, ttl_secs, "async cache write done"),
                Ok(Err(e)) => warn!(%key, error = %e, "async cache write failed"),
                Err(panic) => error!(%key, panic = %panic_message(&*panic), "async cache write panicked"),
            }
        }))
    }

    /// Remove `key`. Returns `true` if it existed.
    pub async fn delete(&self, key: &str) -> KvResult<bool> {
        validate_cache_key(key)?;
        self.bounded(self.backend.delete(&self.namespace, key)).await
    }

    /// Look up `keys` in parallel groups of `batch_size` (0 means 100).
    ///
    /// The result has one entry per key in input order; absent keys and
    /// keys whose group failed are empty strings. Group failures are
    /// logged, not returned. The only error is [`KvError::Format`] for a
    /// malformed key, or [`KvError::Connection`] when every group failed
    /// because the backend was unreachable.
    pub async fn batch_get(&self, keys: &[String], batch_size: usize) -> KvResult<Vec<String>> {
        for key in keys {
            validate_cache_key(key)?;
        }
        let plan = BatchPlan::new(keys.len(), batch_size);
        debug!(
            keys = keys.len(),
            batch_size = plan.batch_size(),
            groups = plan.groups().len(),
            dispatched = plan.dispatched_count(),
            "batch lookup"
        );

        let outcome = fetch_batched(
            Arc::clone(&self.backend),
            Arc::clone(&self.namespace),
            keys,
            &plan,
            self.op_timeout,
        )
        .await;

        if outcome.backend_unreachable() {
            return Err(outcome
                .failures
                .into_iter()
                .last()
                .unwrap_or_else(|| KvError::Connection("backend unreachable".into())));
        }
        Ok(outcome.values)
    }

    async fn bounded<T>(&self, op: impl std::future::Future<Output = KvResult<T>>) -> KvResult<T> {
        match self.op_timeout {
            Some(limit) => tokio::time::timeout(limit, op)
                .await
                .unwrap_or_else(|_| Err(KvError::Timeout(limit.as_millis() as u64))),
            None => op.await,
        }
    }
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("backend", &self.backend.name())
            .field("namespace", &self.namespace)
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
