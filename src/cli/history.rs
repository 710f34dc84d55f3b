//! `promptgate history`: list or export logged chat turns.

use anyhow::{Context, Result};

use promptgate::config::Config;
use promptgate::history::{export, TurnStore};
use promptgate::utils::text::truncate_chars;

use super::ExportFormat;

pub(crate) fn cmd_history(
    config: Config,
    limit: Option<usize>,
    format: Option<ExportFormat>,
) -> Result<()> {
    let store = TurnStore::open(&config.history.dir).with_context(|| {
        format!(
            "Failed to open history store at {}",
            config.history.dir.display()
        )
    })?;
    let limit = limit.unwrap_or(config.history.limit);

    match format {
        Some(ExportFormat::Csv) => {
            let mut turns = store.recent(limit);
            turns.reverse();
            print!("{}", export::to_csv(&turns));
        }
        Some(ExportFormat::Txt) => {
            let mut turns = store.recent(limit);
            turns.reverse();
            let text = export::to_text(&turns);
            let path = store
                .write_text_export(&text)
                .with_context(|| "Failed to save text export")?;
            print!("{}", text);
            eprintln!("Saved to {}", path.display());
        }
        None => {
            let turns = store.recent(limit);
            if turns.is_empty() {
                println!("No chat history found.");
                return Ok(());
            }
            println!("Showing {} of {} turn(s):", turns.len(), store.len());
            for turn in &turns {
                println!(
                    "- #{} | {} | {} tokens | {}",
                    turn.id,
                    turn.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    turn.tokens_used,
                    truncate_chars(&turn.prompt, 60)
                );
            }
        }
    }

    Ok(())
}
