//! Persisted chat turns and their export formats.

pub mod export;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use store::TurnStore;

/// One logged prompt/response exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub id: u64,
    pub prompt: String,
    pub response: String,
    /// Whitespace word count of prompt plus response.
    pub tokens_used: u64,
    pub timestamp: DateTime<Utc>,
}
