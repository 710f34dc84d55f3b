//! CSV and plain-text renderings of chat history.
//!
//! Both take turns in the order they should appear; callers pass them
//! oldest first.

use std::fmt::Write as _;

use super::ChatTurn;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const CSV_HEADER: &str = "id,prompt,response,tokens_used,timestamp";

/// Render turns as RFC 4180 CSV (CRLF line endings, header row first).
pub fn to_csv(turns: &[ChatTurn]) -> String {
    let mut out = String::with_capacity(64 * (turns.len() + 1));
    out.push_str(CSV_HEADER);
    out.push_str("\r\n");
    for turn in turns {
        let _ = write!(
            out,
            "{},{},{},{},{}\r\n",
            turn.id,
            csv_field(&turn.prompt),
            csv_field(&turn.response),
            turn.tokens_used,
            turn.timestamp.format(TIMESTAMP_FORMAT)
        );
    }
    out
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render turns as a human-readable report.
pub fn to_text(turns: &[ChatTurn]) -> String {
    let mut out = String::from("Chat History Export\n==================\n\n");
    for turn in turns {
        let _ = write!(
            out,
            "ID: {}\nTimestamp: {}\nPrompt: {}\nResponse: {}\nTokens Used: {}\n{}\n\n",
            turn.id,
            turn.timestamp.format(TIMESTAMP_FORMAT),
            turn.prompt,
            turn.response,
            turn.tokens_used,
            "-".repeat(50)
        );
    }
    out
}
