//! Client-side input checks for outgoing messages.
//!
//! These are UX guards for the composer only. Nothing here is enforced by
//! the realtime database, so they are never a trust boundary.

use std::ops::Range;

/// Whether replacing the chars in `range` of `current` with `replacement`
/// keeps the pending input within `limit` characters.
///
/// Lengths are counted in chars, not bytes. A range that does not fit inside
/// `current` is rejected.
pub fn edit_fits(current: &str, range: &Range<usize>, replacement: &str, limit: usize) -> bool {
    let current_len = current.chars().count();
    if range.start > range.end || range.end > current_len {
        return false;
    }
    let new_len = current_len + replacement.chars().count() - range.len();
    new_len <= limit
}

/// Apply a char-indexed replacement to `current`.
pub fn apply_edit(current: &str, range: &Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(current.len() + replacement.len());
    out.extend(current.chars().take(range.start));
    out.push_str(replacement);
    out.extend(current.chars().skip(range.end));
    out
}

/// Trim outgoing text; whitespace-only input yields nothing to send.
pub fn sanitize_outgoing(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_fits_at_limit() {
        assert!(edit_fits("", &(0..0), "0123456789", 10));
        assert!(!edit_fits("", &(0..0), "0123456789a", 10));
        assert!(edit_fits("012345678", &(9..9), "9", 10));
        assert!(!edit_fits("0123456789", &(10..10), "x", 10));
    }

    #[test]
    fn test_edit_fits_counts_replaced_range() {
        // Replacing 3 chars with 3 chars keeps the length
        assert!(edit_fits("0123456789", &(0..3), "abc", 10));
        assert!(!edit_fits("0123456789", &(0..3), "abcd", 10));
        // Deleting always fits
        assert!(edit_fits("0123456789", &(5..10), "", 10));
    }

    #[test]
    fn test_edit_fits_counts_chars_not_bytes() {
        assert!(edit_fits("", &(0..0), "日本語日本語日本語日", 10));
        assert!(!edit_fits("日本語日本語日本語日", &(10..10), "本", 10));
    }

    #[test]
    fn test_edit_fits_rejects_bad_ranges() {
        assert!(!edit_fits("abc", &(2..1), "", 10));
        assert!(!edit_fits("abc", &(0..4), "", 10));
    }

    #[test]
    fn test_apply_edit() {
        assert_eq!(apply_edit("hello", &(5..5), "!"), "hello!");
        assert_eq!(apply_edit("hello", &(0..1), "J"), "Jello");
        assert_eq!(apply_edit("日本語", &(1..2), "x"), "日x語");
    }

    #[test]
    fn test_sanitize_outgoing() {
        assert_eq!(sanitize_outgoing("  hi there \n"), Some("hi there".to_string()));
        assert_eq!(sanitize_outgoing("   "), None);
        assert_eq!(sanitize_outgoing(""), None);
    }
}
