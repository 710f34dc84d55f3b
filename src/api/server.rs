//! Axum server for the chat gateway.

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::{GateError, Result};
use crate::gateway::ChatGateway;
use crate::history::TurnStore;

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ChatGateway>,
    pub history: Arc<TurnStore>,
    /// Turns returned by `/history` and the export endpoints.
    pub history_limit: usize,
}

impl AppState {
    pub fn new(gateway: Arc<ChatGateway>, history: Arc<TurnStore>, history_limit: usize) -> Self {
        Self {
            gateway,
            history,
            history_limit,
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = match &self {
            GateError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            GateError::Provider(_) | GateError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            GateError::Config(_) | GateError::Storage(_) | GateError::Io(_) | GateError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let detail = match self {
            GateError::RateLimited(msg) => msg,
            other => {
                if status.is_server_error() {
                    error!(error = %other, "Request failed");
                }
                other.to_string()
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(super::routes::chat::post_chat))
        .route("/history", get(super::routes::history::get_history))
        .route(
            "/export_history_csv",
            get(super::routes::export::export_csv),
        )
        .route(
            "/export_history_txt",
            get(super::routes::export::export_txt),
        )
        .route("/health", get(super::routes::health::get_health))
        .route("/cache/stats", get(super::routes::cache::get_stats))
        .route("/cache/clear", post(super::routes::cache::clear))
        // Prompts are short; 64 KiB is plenty.
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request| {
                info_span!(
                    "http",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %Uuid::new_v4(),
                )
            }),
        )
        .with_state(Arc::new(state))
}

/// Bind `config.bind:config.port` and serve until the process exits.
pub async fn start_server(config: &ServerConfig, state: AppState) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::limiter::TokenBucket;
    use crate::providers::LLMProvider;
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    pub(crate) struct EchoProvider;

    #[async_trait]
    impl LLMProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }

        async fn chat(&self, prompt: &str) -> Result<String> {
            if prompt == "fail" {
                return Err(GateError::Provider("HTTP 503: overloaded".into()));
            }
            Ok(format!("echo {}", prompt))
        }
    }

    /// State over an echo provider, a `rate`-per-minute bucket and a temp
    /// history dir (kept alive by the returned guard).
    pub(crate) fn make_state(rate: f64) -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let bucket = TokenBucket::new(rate, Duration::from_secs(60)).unwrap();
        let cache = ResponseCache::new(50, Duration::from_secs(300)).unwrap();
        let gateway = ChatGateway::new(bucket, cache, Arc::new(EchoProvider));
        let history = TurnStore::open(dir.path()).unwrap();
        let state = AppState::new(Arc::new(gateway), Arc::new(history), 20);
        (state, dir)
    }
}
