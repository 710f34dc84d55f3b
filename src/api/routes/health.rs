//! Liveness endpoint.

use axum::Json;
use serde_json::{json, Value};

/// GET /health: static liveness info plus the current time.
pub async fn get_health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
