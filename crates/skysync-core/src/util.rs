//! Shared utility functions used across multiple modules.

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Truncate text to at most 180 characters for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(180).collect()
}

/// Encode a record id into a single path component.
///
/// Every byte outside `[A-Za-z0-9-_.~]` is percent-encoded, so separators
/// can never survive and distinct ids never collide. Surrounding whitespace
/// is part of the id. Blank ids and ids made only of dots are rejected; the
/// latter name the current or parent directory.
pub fn storage_key_for_id(id: &str) -> Option<String> {
    if id.trim().is_empty() || id.chars().all(|ch| ch == '.') {
        return None;
    }
    Some(urlencoding::encode(id).into_owned())
}
