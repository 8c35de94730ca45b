//! Helpers for sanitizing data before it leaves the process: tracing span
//! attributes, archive entry names, `Content-Disposition` file names and
//! persisted error messages.

use std::path::Path;

/// Maximum length of a sanitized file name, extension excluded.
pub const MAX_FILENAME_LEN: usize = 120;

/// File name used when sanitizing leaves nothing behind.
pub const FALLBACK_FILENAME: &str = "download";

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields: reveals the file name without exposing the full path.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Reduces `raw` to the portable file name alphabet `[A-Za-z0-9._-]`.
///
/// Other characters become `_`, runs of `_` collapse to one, leading dots
/// are stripped and the result is capped at [`MAX_FILENAME_LEN`]. An empty
/// result falls back to [`FALLBACK_FILENAME`].
pub fn sanitize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let mapped = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }

    let trimmed = out.trim_start_matches('.');
    // Everything left is ASCII, so byte slicing is safe.
    let capped = &trimmed[..trimmed.len().min(MAX_FILENAME_LEN)];

    if capped.is_empty() || capped.chars().all(|c| c == '_') {
        FALLBACK_FILENAME.to_string()
    } else {
        capped.to_string()
    }
}

/// Truncates `text` to at most `max_chars` characters, never splitting a
/// character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
