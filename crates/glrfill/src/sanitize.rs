//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Evidence and reports contain personal data (names, addresses, policy
//! numbers). These helpers keep log fields short and free of full paths.

use std::path::Path;

/// Longest model response excerpt written to logs.
pub const MAX_LOGGED_CHARS: usize = 200;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Cuts `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}… ({} chars total)", &text[..byte_index], text.chars().count()),
        None => text.to_string(),
    }
}
