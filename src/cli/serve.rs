//! `promptgate serve`: run the HTTP API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use promptgate::api::{start_server, AppState};
use promptgate::config::Config;
use promptgate::gateway::ChatGateway;
use promptgate::history::TurnStore;

pub(crate) async fn cmd_serve(
    mut config: Config,
    bind: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate().with_context(|| "Invalid configuration")?;

    let gateway =
        ChatGateway::from_config(&config).with_context(|| "Failed to build chat gateway")?;
    let history = TurnStore::open(&config.history.dir).with_context(|| {
        format!(
            "Failed to open history store at {}",
            config.history.dir.display()
        )
    })?;
    info!(dir = %config.history.dir.display(), turns = history.len(), "History store ready");

    let state = AppState::new(
        Arc::new(gateway),
        Arc::new(history),
        config.history.limit,
    );
    start_server(&config.server, state)
        .await
        .with_context(|| format!("API server on {}:{} failed", config.server.bind, config.server.port))
}
