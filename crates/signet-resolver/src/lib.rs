//! Cache-aside resolution of encoded object tokens into signed URLs.
//!
//! [`CacheAsideResolver::resolve`] takes a batch of tokens and returns one
//! URL per token, in order:
//!
//! 1. plain `http(s)://` URLs are copied through untouched;
//! 2. encoded tokens are decoded and mapped to cache keys;
//! 3. all keys are looked up in one batched, parallel cache read;
//! 4. each miss is signed on its own task, and the fresh URL is written
//!    back to the cache for half its validity without waiting on the write.
//!
//! Items that cannot be resolved come back as empty strings. A call never
//! fails as a whole because some of its items did.

pub mod config;
pub mod error;
pub mod resolver;

pub use config::{cache_ttl_secs, ResolverConfig};
pub use error::{ResolveError, ResolveResult};
pub use resolver::{CacheAsideResolver, ResolveOutcome, ResolveStats};
