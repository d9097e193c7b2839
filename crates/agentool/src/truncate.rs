//! UTF-8-safe tail extraction for diagnostic text.

/// Keep the last `max_chars` characters of `s`.
///
/// Returns `s` unchanged when it is already short enough. Never splits a
/// multi-byte character.
///
/// # Examples
///
/// ```
/// use agentool::truncate::tail_chars;
///
/// assert_eq!(tail_chars("hello world", 5), "world");
/// assert_eq!(tail_chars("héllo", 4), "éllo");
/// ```
#[must_use]
pub fn tail_chars(s: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match s.char_indices().rev().nth(max_chars.saturating_sub(1)) {
        Some((start, _)) => &s[start..],
        None => s,
    }
}

/// Decode captured bytes lossily and keep the last `max_chars` characters.
#[must_use]
pub fn tail_lossy(bytes: &[u8], max_chars: usize) -> String {
    tail_chars(&String::from_utf8_lossy(bytes), max_chars).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_string_returned_unchanged() {
        assert_eq!(tail_chars("boom", 4000), "boom");
    }

    #[test]
    fn empty_string_returned_unchanged() {
        assert_eq!(tail_chars("", 10), "");
    }

    #[test]
    fn exact_length_returned_unchanged() {
        let s = "x".repeat(200);
        assert_eq!(tail_chars(&s, 200), s);
    }

    #[test]
    fn keeps_the_end() {
        let s = format!("{}END", "x".repeat(5000));
        let tail = tail_chars(&s, 4000);
        assert_eq!(tail.chars().count(), 4000);
        assert!(tail.ends_with("END"));
    }

    #[test]
    fn multibyte_counts_characters_not_bytes() {
        let s = "🦀🦀🦀";
        assert_eq!(tail_chars(s, 2), "🦀🦀");
    }

    #[test]
    fn zero_budget_is_empty() {
        assert_eq!(tail_chars("abc", 0), "");
    }

    #[test]
    fn lossy_decoding_survives_invalid_utf8() {
        let bytes = [b'o', b'k', 0xff, b'!'];
        assert_eq!(tail_lossy(&bytes, 2), "\u{fffd}!");
    }
}
