//! Small helpers shared by the config, remote and CLI layers.

/// Longest host error body kept in a status message.
const MAX_ERROR_EXCERPT: usize = 180;

/// Trim a user-supplied remote id, token or URL. Blank counts as unset.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Whether an API base URL uses `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Leading part of a non-JSON error body from the Gist host, short enough
/// for the sync status line.
pub fn error_excerpt(body: &str) -> String {
    body.trim().chars().take(MAX_ERROR_EXCERPT).collect()
}

/// Current Unix timestamp in milliseconds.
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
