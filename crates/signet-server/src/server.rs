use tokio::net::TcpListener;
use tracing::info;

use signet_kv::KeyValueStore;
use signet_resolver::CacheAsideResolver;
use signet_sign::SignedUrlGenerator;

use crate::config::{ServerConfig, SignetConfig};
use crate::error::{ServerError, ServerResult};
use crate::router::build_router;

/// Connect the cache and build a resolver from `config`.
///
/// The cache handle is created once here and shared by every request.
pub async fn build_resolver(config: &SignetConfig) -> ServerResult<CacheAsideResolver> {
    let store = KeyValueStore::connect(&config.kv).await?;
    let generator = SignedUrlGenerator::s3(config.signer.clone());
    Ok(CacheAsideResolver::new(store, generator, config.resolver.clone()))
}

/// Signet HTTP server.
pub struct SignetServer {
    config: ServerConfig,
    resolver: CacheAsideResolver,
}

impl SignetServer {
    pub fn new(config: ServerConfig, resolver: CacheAsideResolver) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.resolver.clone())
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            cache = self.resolver.store().backend_name(),
            "signet server listening"
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
