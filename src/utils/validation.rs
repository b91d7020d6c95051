//! Input validation and normalization helpers

use chrono::{DateTime, Utc};

/// Maximum stored length of a User-Agent header
pub const MAX_USER_AGENT_CHARS: usize = 500;

/// Truncate to at most `max` characters without splitting a code point
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}

/// Validate an absolute http(s) URL
pub fn validate_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !host.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Check that an optional time window is ordered
pub fn validate_window(starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> bool {
    match (starts_at, ends_at) {
        (Some(start), Some(end)) => start <= end,
        _ => true,
    }
}

/// Parse a timestamp stored by the repositories
pub fn parse_db_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
    }
    None
}
