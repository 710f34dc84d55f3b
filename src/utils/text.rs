//! Small text helpers shared by the API and CLI.

/// Truncate `text` to at most `max_chars` characters (never splits a char).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Whitespace word count, used as the token estimate for logged turns.
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
