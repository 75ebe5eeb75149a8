use std::time::Duration;

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use signet_resolver::{CacheAsideResolver, ResolveStats};
use signet_types::{KeyCodec, ObjectReference};

use crate::error::ServerResult;

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub resolver: CacheAsideResolver,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub tokens: Vec<String>,
    /// Falls back to the resolver's configured expiry.
    #[serde(default)]
    pub expiry_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_deserializing)]
    pub stats: ResolveStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EncodeResponse {
    pub token: String,
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "signet-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Resolve a batch of tokens. Always answers 200; unresolved items are
/// empty strings and the last item-level error is reported alongside.
pub async fn resolve_handler(
    State(state): State<AppState>,
    Json(req): Json<ResolveRequest>,
) -> Json<ResolveResponse> {
    let config = state.resolver.config();
    let expiry = req
        .expiry_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.expiry());
    let outcome = state
        .resolver
        .resolve_detailed(&req.tokens, expiry, config.retry_attempts)
        .await;
    Json(ResolveResponse {
        urls: outcome.urls,
        error: outcome.last_error.map(|e| e.to_string()),
        stats: outcome.stats,
    })
}

/// Encode an object reference into a token.
pub async fn encode_handler(Json(reference): Json<ObjectReference>) -> ServerResult<Json<EncodeResponse>> {
    let token = KeyCodec::encode(&reference)?;
    Ok(Json(EncodeResponse { token }))
}
