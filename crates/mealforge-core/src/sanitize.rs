//! Scrubbing of error text before it leaves the worker.
//!
//! Anything logged, broadcast, stored in `last_error` or written to the
//! dead letter queue goes through [`sanitize_message`] first.

use std::sync::LazyLock;

use regex::Regex;

/// Upper bound on a sanitized message, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 1024;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});

static BEARER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]+").expect("valid regex")
});

static SECRET_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(api[_-]?key|token|secret|password)=([^&\s]+)").expect("valid regex")
});

/// Cut `s` to at most `max_bytes` on a char boundary, marking the cut.
pub fn truncate_snippet(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_owned();
    }
    let mut end = max_bytes.saturating_sub(3);
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut truncated = s[..end].to_owned();
    truncated.push_str("...");
    truncated
}

/// Redact email addresses, bearer tokens and secret query parameters, then
/// truncate to [`MAX_MESSAGE_BYTES`].
pub fn sanitize_message(raw: &str) -> String {
    let redacted = EMAIL.replace_all(raw, "[email]");
    let redacted = BEARER.replace_all(&redacted, "Bearer [redacted]");
    let redacted = SECRET_PARAM.replace_all(&redacted, "$1=[redacted]");
    truncate_snippet(&redacted, MAX_MESSAGE_BYTES)
}

/// Sanitized single-line rendering of an error and its causes.
pub fn sanitize_error(err: &anyhow::Error) -> String {
    sanitize_message(&format!("{err:#}"))
}
