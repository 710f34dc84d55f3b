//! `POST /chat`: admit, answer from cache or upstream, log the turn.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::server::AppState;
use crate::error::{GateError, Result};
use crate::history::ChatTurn;
use crate::utils::text::truncate_chars;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub prompt: String,
}

/// The stored turn plus how it was answered.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub turn: ChatTurn,
    pub cached: bool,
    pub elapsed_ms: f64,
}

/// Text logged and returned when the upstream call fails. Carries the first
/// 100 characters of the upstream message.
fn unavailable_text(err: &GateError) -> String {
    format!(
        "Error: LLM service unavailable ({})",
        truncate_chars(&err.detail(), 100)
    )
}

pub async fn post_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    state.gateway.admit()?;

    let (response, cached, elapsed_ms) = match state.gateway.fetch(&req.prompt).await {
        Ok(lookup) => (lookup.value, lookup.cached, lookup.elapsed_ms),
        Err(e) => {
            warn!(error = %e, prompt_len = req.prompt.len(), "Upstream call failed");
            (unavailable_text(&e), false, 0.0)
        }
    };

    let history = Arc::clone(&state.history);
    let prompt = req.prompt;
    let turn = tokio::task::spawn_blocking(move || history.insert(&prompt, &response))
        .await
        .map_err(|e| GateError::Storage(format!("history task failed: {}", e)))??;

    info!(id = turn.id, cached, elapsed_ms, "Chat turn served");
    Ok(Json(ChatResponse {
        turn,
        cached,
        elapsed_ms,
    }))
}
