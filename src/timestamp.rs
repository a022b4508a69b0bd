//! Converts provider-supplied timestamp strings into RFC3339 UTC.
//!
//! GitLab sends timestamps in two observed forms: `"2025-10-19 21:55:41 UTC"`
//! in pipeline attributes, and already-RFC3339 elsewhere.

/// Normalizes a timestamp string to RFC3339 UTC ending in `Z`.
///
/// Returns `None` for empty input; callers supply a fallback. Strings that
/// are already RFC3339 (trailing `Z` or a numeric offset) pass through
/// unchanged.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(stripped) = trimmed.strip_suffix(" UTC") {
        return Some(format!("{}Z", stripped.replacen(' ', "T", 1)));
    }
    Some(trimmed.to_string())
}
