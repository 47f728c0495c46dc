//! Small string helpers shared by the client and the token manager.

/// Character budget for response bodies quoted in logs and errors.
pub const BODY_SNIPPET_CHARS: usize = 300;

/// Shorter budget for the `/athlete` probe diagnostic.
pub const PROBE_SNIPPET_CHARS: usize = 200;

/// Cut `s` to at most `max_chars` characters, marking the cut with `…`.
///
/// Counts characters rather than bytes so multi-byte bodies never split
/// inside a code point.
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}…", &s[..byte_idx]),
    }
}

/// [`truncate`] with the default body budget.
pub fn body_snippet(body: &str) -> String {
    truncate(body, BODY_SNIPPET_CHARS)
}
