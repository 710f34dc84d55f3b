//! Cache diagnostics.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::api::server::AppState;
use crate::cache::CacheStats;

/// GET /cache/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.gateway.cache().stats())
}

/// POST /cache/clear: drops every entry, statistics are kept.
pub async fn clear(State(state): State<Arc<AppState>>) -> Json<Value> {
    let removed = state.gateway.cache().clear();
    info!(removed, "Cache cleared via API");
    Json(json!({ "cleared": removed }))
}
