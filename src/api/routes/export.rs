//! History downloads. Both formats list turns oldest first.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use std::sync::Arc;
use tracing::debug;

use crate::api::server::AppState;
use crate::error::{GateError, Result};
use crate::history::{export, ChatTurn};

fn oldest_first(state: &AppState) -> Vec<ChatTurn> {
    let mut turns = state.history.recent(state.history_limit);
    turns.reverse();
    turns
}

/// GET /export_history_csv
pub async fn export_csv(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = export::to_csv(&oldest_first(&state));
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=chat_history.csv",
            ),
        ],
        body,
    )
}

/// GET /export_history_txt: also saved as `chat_history_export.txt` in the
/// history directory.
pub async fn export_txt(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let body = export::to_text(&oldest_first(&state));

    let history = Arc::clone(&state.history);
    let text = body.clone();
    let path = tokio::task::spawn_blocking(move || history.write_text_export(&text))
        .await
        .map_err(|e| GateError::Storage(format!("export task failed: {}", e)))??;
    debug!(path = %path.display(), "Text export saved");

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=chat_history.txt",
            ),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::{build_router, test_support::make_state};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn get(state: AppState, uri: &str) -> (StatusCode, String, String, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = build_router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let header_str = |name: header::HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        let content_type = header_str(header::CONTENT_TYPE);
        let disposition = header_str(header::CONTENT_DISPOSITION);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (
            status,
            content_type,
            disposition,
            String::from_utf8(bytes.to_vec()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_csv_export_oldest_first() {
        let (state, _dir) = make_state(10.0);
        state.history.insert("first prompt", "one").unwrap();
        state.history.insert("second prompt", "two").unwrap();

        let (status, content_type, disposition, body) =
            get(state, "/export_history_csv").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/csv; charset=utf-8");
        assert_eq!(disposition, "attachment; filename=chat_history.csv");

        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "id,prompt,response,tokens_used,timestamp");
        assert!(lines[1].starts_with("1,first prompt,one,3,"), "{body}");
        assert!(lines[2].starts_with("2,second prompt,two,3,"), "{body}");
    }

    #[tokio::test]
    async fn test_csv_export_respects_limit() {
        let (mut state, _dir) = make_state(10.0);
        state.history_limit = 2;
        for i in 1..=4 {
            state.history.insert(&format!("p{i}"), "r").unwrap();
        }
        let (_, _, _, body) = get(state, "/export_history_csv").await;
        let ids: Vec<&str> = body
            .lines()
            .skip(1)
            .filter_map(|l| l.split(',').next())
            .collect();
        assert_eq!(ids, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_txt_export_writes_file() {
        let (state, dir) = make_state(10.0);
        state.history.insert("What is Rust?", "A language.").unwrap();

        let (status, content_type, disposition, body) =
            get(state, "/export_history_txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/plain; charset=utf-8");
        assert_eq!(disposition, "attachment; filename=chat_history.txt");
        assert!(body.starts_with("Chat History Export\n==================\n\n"));
        assert!(body.contains("Prompt: What is Rust?\n"));

        let saved = std::fs::read_to_string(dir.path().join("chat_history_export.txt")).unwrap();
        assert_eq!(saved, body);
    }
}
