//! Small text helpers shared by tools and the research loop.

/// Marker appended when tool output is cut.
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Cut `text` to at most `cap` characters, ending with `marker` when cut.
///
/// The result never exceeds `cap` characters, so truncating an already
/// truncated string is a no-op.
pub fn truncate_with_marker(text: &str, cap: usize, marker: &str) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    let marker_len = marker.chars().count();
    if cap <= marker_len {
        return text.chars().take(cap).collect();
    }
    let mut out: String = text.chars().take(cap - marker_len).collect();
    out.push_str(marker);
    out
}

/// The first `max` characters of `text`, on a char boundary.
pub fn prefix_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_untouched() {
        assert_eq!(truncate_with_marker("Lima", 10, TRUNCATION_MARKER), "Lima");
    }

    #[test]
    fn long_text_cut_within_cap() {
        let text = "x".repeat(100);
        let out = truncate_with_marker(&text, 40, TRUNCATION_MARKER);
        assert_eq!(out.chars().count(), 40);
        assert!(out.ends_with(TRUNCATION_MARKER));
        assert_eq!(truncate_with_marker(&out, 40, TRUNCATION_MARKER), out);
    }

    #[test]
    fn multibyte_safe() {
        let text = "é".repeat(50);
        let out = truncate_with_marker(&text, 20, "…");
        assert_eq!(out.chars().count(), 20);
        assert_eq!(prefix_chars("héllo", 2), "hé");
        assert_eq!(prefix_chars("hi", 10), "hi");
    }
}
