//! Namespaced key-value cache client for Signet.
//!
//! A [`KeyValueStore`] wraps one process-wide backend handle and exposes
//! point get/put/delete, fire-and-forget writes, and batched lookups that
//! fan out one task per group of keys.
//!
//! # Backends
//!
//! All backends implement the [`KvBackend`] trait:
//!
//! - [`MemoryBackend`] -- sharded, TTL-aware, in-process
//! - [`RedisBackend`] -- one pooled connection set per host, keys sharded by hash
//!
//! # Design Rules
//!
//! 1. Every key is validated as `app|project|key` before any backend call.
//! 2. Writes are last-write-wins; there is no compare-and-swap.
//! 3. Expiry belongs to the backend; the store never deletes proactively.
//! 4. A failed batch group degrades to misses; it is logged, not returned.
//! 5. Only an unreachable backend is a hard error.

pub mod backend;
pub mod batch;
pub mod config;
pub mod error;
pub mod memory;
pub mod redis_backend;
pub mod store;

pub use backend::{KvBackend, Lookup, Miss, Namespace};
pub use batch::{normalize_batch_size, BatchPlan, DEFAULT_BATCH_SIZE};
pub use config::{BackendKind, KvConfig};
pub use error::{KvError, KvResult};
pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;
pub use store::KeyValueStore;
