//! JSON-file backed, append-only store of chat turns.
//!
//! All turns are held in memory and the whole list is rewritten to
//! `<dir>/chat_history.json` after each insert, via a temp file and rename.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::ChatTurn;
use crate::error::{GateError, Result};
use crate::utils::text::word_count;

const HISTORY_FILE: &str = "chat_history.json";
const TEXT_EXPORT_FILE: &str = "chat_history_export.txt";

#[derive(Debug)]
pub struct TurnStore {
    dir: PathBuf,
    turns: Mutex<Vec<ChatTurn>>,
}

impl TurnStore {
    /// Open (or create) the store in `dir`.
    ///
    /// A missing file starts an empty history; an unreadable one is logged
    /// and replaced on the next insert.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| {
            GateError::Storage(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let path = dir.join(HISTORY_FILE);
        let turns = match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<Vec<ChatTurn>>(&data) {
                Ok(turns) => turns,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt chat history, starting fresh");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), turns = turns.len(), "Chat history loaded");

        Ok(Self {
            dir: dir.to_path_buf(),
            turns: Mutex::new(turns),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append a turn and persist. Ids increase monotonically from 1.
    pub fn insert(&self, prompt: &str, response: &str) -> Result<ChatTurn> {
        let mut turns = self.lock();
        let id = turns.last().map_or(1, |t| t.id + 1);
        let turn = ChatTurn {
            id,
            prompt: prompt.to_string(),
            response: response.to_string(),
            tokens_used: word_count(prompt) + word_count(response),
            timestamp: Utc::now(),
        };
        turns.push(turn.clone());
        if let Err(e) = self.persist(&turns) {
            turns.pop();
            return Err(e);
        }
        debug!(id, tokens_used = turn.tokens_used, "Chat turn stored");
        Ok(turn)
    }

    /// Up to `limit` most recent turns, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ChatTurn> {
        self.lock().iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Write a rendered text export next to the history file.
    pub fn write_text_export(&self, text: &str) -> Result<PathBuf> {
        let path = self.dir.join(TEXT_EXPORT_FILE);
        fs::write(&path, text)
            .map_err(|e| GateError::Storage(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(path)
    }

    fn persist(&self, turns: &[ChatTurn]) -> Result<()> {
        let path = self.dir.join(HISTORY_FILE);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(turns)?;
        fs::write(&tmp, data)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| GateError::Storage(format!("cannot write {}: {}", path.display(), e)))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ChatTurn>> {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
