//! Interactive chat REPL and one-shot `ask`.

use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::debug;

use promptgate::cache::Lookup;
use promptgate::config::Config;
use promptgate::gateway::ChatGateway;
use promptgate::GateError;

/// Session ends after this long without input.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);

const DEMO_PROMPT: &str = "What is Python?";

/// Words the REPL handles itself instead of sending upstream.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand<'a> {
    Empty,
    Exit,
    Stats,
    Clear,
    Demo,
    Prompt(&'a str),
}

fn parse_line(line: &str) -> ReplCommand<'_> {
    let line = line.trim();
    match line.to_lowercase().as_str() {
        "" => ReplCommand::Empty,
        "exit" | "quit" => ReplCommand::Exit,
        "cache" => ReplCommand::Stats,
        "clear" => ReplCommand::Clear,
        "demo" => ReplCommand::Demo,
        _ => ReplCommand::Prompt(line),
    }
}

fn render_answer(lookup: &Lookup) -> String {
    let tag = if lookup.cached { "CACHED" } else { "FRESH" };
    format!(
        "[{} in {:.1}ms]\nAI: {}",
        tag, lookup.elapsed_ms, lookup.value
    )
}

enum ReadOutcome {
    Line(String),
    TimedOut,
    Closed,
}

/// Line editor running on its own thread so reads can time out.
///
/// rustyline blocks the calling thread; the editor thread takes prompts
/// over a std channel and sends lines back over a tokio channel.
struct LineReader {
    prompts: std_mpsc::Sender<String>,
    lines: mpsc::UnboundedReceiver<Option<String>>,
}

impl LineReader {
    fn spawn() -> Result<Self> {
        let (prompt_tx, prompt_rx) = std_mpsc::channel::<String>();
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<std::result::Result<(), String>>(1);

        thread::Builder::new()
            .name("repl-input".into())
            .spawn(move || {
                let mut editor = match DefaultEditor::new() {
                    Ok(editor) => {
                        let _ = ready_tx.send(Ok(()));
                        editor
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                while let Ok(prompt) = prompt_rx.recv() {
                    let line = match editor.readline(&prompt) {
                        Ok(line) => {
                            if !line.trim().is_empty() {
                                let _ = editor.add_history_entry(line.as_str());
                            }
                            Some(line)
                        }
                        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => None,
                        Err(e) => {
                            debug!(error = %e, "Readline failed");
                            None
                        }
                    };
                    let done = line.is_none();
                    if line_tx.send(line).is_err() || done {
                        break;
                    }
                }
            })
            .context("Failed to spawn input thread")?;

        ready_rx
            .recv()
            .context("Input thread exited during startup")?
            .map_err(|e| anyhow::anyhow!("Failed to initialize line editor: {}", e))?;

        Ok(Self {
            prompts: prompt_tx,
            lines: line_rx,
        })
    }

    async fn read(&mut self, prompt: String, timeout: Duration) -> ReadOutcome {
        if self.prompts.send(prompt).is_err() {
            return ReadOutcome::Closed;
        }
        match tokio::time::timeout(timeout, self.lines.recv()).await {
            Ok(Some(Some(line))) => ReadOutcome::Line(line),
            Ok(_) => ReadOutcome::Closed,
            Err(_) => ReadOutcome::TimedOut,
        }
    }
}

/// Answer one prompt through admission and the cache, printing the result.
async fn answer(gateway: &ChatGateway, prompt: &str) {
    match gateway.ask(prompt).await {
        Ok(lookup) => println!("{}", render_answer(&lookup)),
        Err(GateError::RateLimited(msg)) => println!("[429] {}", msg),
        Err(e) => println!("Error: {}", e),
    }
}

/// Ask the demo prompt twice (bypassing admission) and print stats.
async fn run_demo(gateway: &ChatGateway) {
    let capacity = gateway.cache().capacity();
    for _ in 0..2 {
        println!("[Cache: {}/{}] You: {}", gateway.cache().len(), capacity, DEMO_PROMPT);
        match gateway.fetch(DEMO_PROMPT).await {
            Ok(lookup) => println!("{}", render_answer(&lookup)),
            Err(e) => println!("Error: {}", e),
        }
    }
    println!("{}", gateway.cache().stats());
}

/// Run the interactive chat loop until exit, EOF or idle timeout.
pub(crate) async fn cmd_chat(config: Config) -> Result<()> {
    let gateway =
        ChatGateway::from_config(&config).with_context(|| "Failed to build chat gateway")?;
    let capacity = gateway.cache().capacity();
    let mut input = LineReader::spawn()?;

    println!(
        "Chat with {} ({}). Commands: cache, clear, demo, exit.",
        gateway.provider().default_model(),
        gateway.provider().name()
    );

    loop {
        let prompt = format!("[Cache: {}/{}] You: ", gateway.cache().len(), capacity);
        let line = match input.read(prompt, IDLE_TIMEOUT).await {
            ReadOutcome::Line(line) => line,
            ReadOutcome::TimedOut => {
                println!("\n[Timeout] No input for 5 minutes. Exiting chat.");
                break;
            }
            ReadOutcome::Closed => {
                println!("Goodbye!");
                break;
            }
        };

        match parse_line(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => {
                println!("Goodbye!");
                break;
            }
            ReplCommand::Stats => println!("{}", gateway.cache().stats()),
            ReplCommand::Clear => {
                gateway.cache().clear();
                println!("Cache cleared.");
            }
            ReplCommand::Demo => run_demo(&gateway).await,
            ReplCommand::Prompt(text) => answer(&gateway, text).await,
        }
    }

    Ok(())
}

/// Answer a single prompt and exit.
pub(crate) async fn cmd_ask(config: Config, prompt: &str) -> Result<()> {
    let gateway =
        ChatGateway::from_config(&config).with_context(|| "Failed to build chat gateway")?;
    let lookup = gateway
        .ask(prompt)
        .await
        .with_context(|| "Failed to answer prompt")?;
    println!("{}", lookup.value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_commands_case_insensitive() {
        assert_eq!(parse_line("  EXIT "), ReplCommand::Exit);
        assert_eq!(parse_line("quit"), ReplCommand::Exit);
        assert_eq!(parse_line("Cache"), ReplCommand::Stats);
        assert_eq!(parse_line("clear"), ReplCommand::Clear);
        assert_eq!(parse_line("demo"), ReplCommand::Demo);
        assert_eq!(parse_line("   "), ReplCommand::Empty);
    }

    #[test]
    fn test_parse_line_keeps_prompt_case() {
        assert_eq!(
            parse_line("  What is Rust? "),
            ReplCommand::Prompt("What is Rust?")
        );
    }

    #[test]
    fn test_render_answer_tags() {
        let fresh = Lookup {
            value: "hi".into(),
            cached: false,
            elapsed_ms: 812.34,
        };
        assert_eq!(render_answer(&fresh), "[FRESH in 812.3ms]\nAI: hi");

        let cached = Lookup {
            cached: true,
            elapsed_ms: 0.04,
            ..fresh
        };
        assert_eq!(render_answer(&cached), "[CACHED in 0.0ms]\nAI: hi");
    }
}
