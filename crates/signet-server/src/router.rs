use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use signet_resolver::CacheAsideResolver;

use crate::handler::{self, AppState};

/// Build the axum router with all Signet endpoints.
pub fn build_router(resolver: CacheAsideResolver) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/resolve", post(handler::resolve_handler))
        .route("/v1/encode", post(handler::encode_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { resolver })
}
