//! Canonical composition, applied at construction time and to the small
//! window around each splice.
//!
//! Everything stored in a [`Text`](crate::Text) or [`Rope`](crate::Rope) is
//! kept canonically composed. Because composition is local - a character can
//! only interact with its neighbors inside a combining sequence - an edit
//! only ever needs to renormalize from the grapheme boundary before the
//! splice to the grapheme boundary after it. The callers in `text` and
//! `rope` find that window; this module just runs composition over it.

use std::borrow::Cow;

use unicode_normalization::UnicodeNormalization;

/// Canonically compose `s`. Borrows when the input is already composed,
/// which is the overwhelmingly common case for real text.
pub(crate) fn normalize(s: &str) -> Cow<'_, str> {
    if unicode_normalization::is_nfc(s) {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.chars().nfc().collect())
    }
}

/// Compose a splice window, returning the replacement only if composition
/// changed anything. Windows are tiny (a couple of grapheme clusters), so
/// the exact compare is cheap and avoids false positives from quick checks.
pub(crate) fn renormalized(window: &str) -> Option<String> {
    let composed: String = window.chars().nfc().collect();
    if composed == window {
        None
    } else {
        Some(composed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_combining_marks() {
        assert_eq!(normalize("a\u{0308}"), "ä");
        assert_eq!(normalize("e\u{0301}clair"), "éclair");
        // Hangul jamo compose too.
        assert_eq!(normalize("\u{1100}\u{1161}\u{11A8}"), "\u{AC01}");
    }

    #[test]
    fn composed_input_borrows() {
        assert!(matches!(normalize("already fine"), Cow::Borrowed(_)));
        assert!(matches!(normalize("äöü"), Cow::Borrowed(_)));
    }

    #[test]
    fn renormalized_reports_changes_only() {
        assert_eq!(renormalized("abc"), None);
        assert_eq!(renormalized("a\u{0308}bc").as_deref(), Some("äbc"));
    }
}
