//! Command-line interface.

mod chat;
mod history;
mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use promptgate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "promptgate", version, about = "Rate-limited, cached LLM chat gateway")]
pub struct Cli {
    /// Config file (defaults to ~/.promptgate/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides server.port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Interactive chat (default when no command is given)
    Chat,
    /// Answer a single prompt
    Ask {
        /// Prompt text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Show or export logged chat turns
    History {
        /// Number of turns (defaults to history.limit)
        #[arg(long, short)]
        limit: Option<usize>,
        /// Export instead of listing
        #[arg(long, value_enum)]
        export: Option<ExportFormat>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Txt,
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Serve { bind, port } => serve::cmd_serve(config, bind, port).await,
        Commands::Chat => chat::cmd_chat(config).await,
        Commands::Ask { prompt } => chat::cmd_ask(config, &prompt.join(" ")).await,
        Commands::History { limit, export } => history::cmd_history(config, limit, export),
    }
}
