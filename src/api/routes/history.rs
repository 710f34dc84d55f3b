//! Recent chat history.

use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::api::server::AppState;
use crate::history::ChatTurn;

/// GET /history: the most recent turns, newest first.
pub async fn get_history(State(state): State<Arc<AppState>>) -> Json<Vec<ChatTurn>> {
    Json(state.history.recent(state.history_limit))
}
