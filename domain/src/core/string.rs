//! String utilities for the domain layer.
//!
//! Every context budget in this crate counts characters (Unicode scalar
//! values), never bytes, so these helpers do the same.

/// Number of characters in `s`.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Keep at most `max_chars` characters of `s`, without any marker.
pub fn take_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Trim `s` and cut it to `max_chars` characters, appending `...` when cut.
///
/// The ellipsis is added on top of the limit, so the result can be up to
/// `max_chars + 3` characters long.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    if char_len(trimmed) <= max_chars {
        return trimmed.to_string();
    }
    format!("{}...", take_chars(trimmed, max_chars))
}

/// Single-line preview for listings: newlines collapsed, cut to `max_chars`.
pub fn preview(s: &str, max_chars: usize) -> String {
    let flat = s.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&flat, max_chars)
}
