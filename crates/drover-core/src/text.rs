//! Small text helpers shared by log statements and exports.

/// Truncate a string to at most `max_chars` characters, respecting char
/// boundaries. Returns an owned string with a trailing ellipsis when
/// truncation happened.
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_owned();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    format!("{truncated}…")
}
