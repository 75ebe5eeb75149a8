//! HTTP server for Signet.
//!
//! Exposes batch token resolution and token encoding as a small JSON API
//! over one shared [`CacheAsideResolver`](signet_resolver::CacheAsideResolver).

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{ServerConfig, SignetConfig};
pub use error::{ServerError, ServerResult};
pub use handler::{AppState, EncodeResponse, ResolveRequest, ResolveResponse};
pub use server::{build_resolver, SignetServer};
