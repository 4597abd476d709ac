//! A contiguous, always canonically composed UTF-8 buffer.

use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

use crate::error::InvalidEncoding;
use crate::normalize::{normalize, renormalized};
use crate::segment;
use crate::transcode::{Utf16Chars, Utf8Chars};

/// An owned string that is guaranteed to stay canonically composed across
/// every public mutation.
///
/// `Text` is the contiguous sibling of [`Rope`](crate::Rope): same
/// invariants and largely the same API, but stored in one flat buffer. It
/// is also what rope leaves hold internally.
///
/// Positions are byte offsets and must lie on `char` boundaries, exactly
/// like [`String`]. Mutations renormalize the grapheme-bounded window
/// around the splice, so inserting a combining mark after a base character
/// composes with it rather than leaving a decomposed seam:
///
/// ```
/// use cordage::Text;
///
/// let mut t = Text::from("aa");
/// t.insert(1, "\u{0308}");
/// assert_eq!(t.as_str(), "äa");
/// assert_eq!(t.len_graphemes(), 2);
/// ```
#[derive(Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Text {
    buf: String,
}

impl Text {
    pub fn new() -> Self {
        Text { buf: String::new() }
    }

    /// Wrap a buffer the caller knows is already composed.
    pub(crate) fn from_normalized(buf: String) -> Self {
        debug_assert!(renormalized(&buf).is_none());
        Text { buf }
    }

    /// Strict UTF-8 constructor. Unlike `str::from_utf8`, this also rejects
    /// noncharacters.
    pub fn from_utf8(bytes: &[u8]) -> Result<Self, InvalidEncoding> {
        crate::transcode::validate_utf8(bytes)?;
        let s: String = Utf8Chars::new(bytes).collect();
        Ok(Text::from(s))
    }

    /// Lossy UTF-8 constructor; ill-formed subsequences become U+FFFD.
    pub fn from_utf8_lossy(bytes: &[u8]) -> Self {
        let s: String = Utf8Chars::new(bytes).collect();
        Text::from(s)
    }

    /// Strict UTF-16 constructor.
    pub fn from_utf16(units: &[u16]) -> Result<Self, InvalidEncoding> {
        crate::transcode::validate_utf16(units)?;
        let s: String = Utf16Chars::new(units).collect();
        Ok(Text::from(s))
    }

    /// Lossy UTF-16 constructor; unpaired surrogates become U+FFFD.
    pub fn from_utf16_lossy(units: &[u16]) -> Self {
        let s: String = Utf16Chars::new(units).collect();
        Text::from(s)
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn len_bytes(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len_chars(&self) -> usize {
        str_indices::chars::count(&self.buf)
    }

    /// The length of this text in UTF-16 code units.
    pub fn len_utf16(&self) -> usize {
        str_indices::utf16::count(&self.buf)
    }

    /// The number of grapheme clusters. O(n).
    pub fn len_graphemes(&self) -> usize {
        self.graphemes().count()
    }

    pub fn chars(&self) -> std::str::Chars<'_> {
        self.buf.chars()
    }

    pub fn char_indices(&self) -> std::str::CharIndices<'_> {
        self.buf.char_indices()
    }

    /// Iterate over grapheme clusters, front to back or (via `.rev()`) back
    /// to front.
    pub fn graphemes(&self) -> impl DoubleEndedIterator<Item = &str> {
        use unicode_segmentation::UnicodeSegmentation;
        self.buf.graphemes(true)
    }

    /// This text as UTF-16 code units.
    pub fn utf16_units(&self) -> impl Iterator<Item = u16> + '_ {
        self.buf.encode_utf16()
    }

    pub fn is_char_boundary(&self, at: usize) -> bool {
        self.buf.is_char_boundary(at)
    }

    pub fn is_grapheme_boundary(&self, at: usize) -> bool {
        assert!(self.buf.is_char_boundary(at), "offset not on a char boundary");
        segment::is_grapheme_boundary(self.buf.as_str(), at)
    }

    /// The first grapheme boundary strictly after `at` (or the end).
    pub fn next_grapheme_boundary(&self, at: usize) -> usize {
        assert!(self.buf.is_char_boundary(at), "offset not on a char boundary");
        segment::next_grapheme_boundary(self.buf.as_str(), at)
    }

    /// The last grapheme boundary strictly before `at` (or 0).
    pub fn prev_grapheme_boundary(&self, at: usize) -> usize {
        assert!(self.buf.is_char_boundary(at), "offset not on a char boundary");
        segment::prev_grapheme_boundary(self.buf.as_str(), at)
    }

    /// Byte offset of the grapheme cluster with index `idx`. `idx` may equal
    /// `len_graphemes()`, giving the end of the buffer.
    pub fn grapheme_to_byte(&self, idx: usize) -> usize {
        let mut at = 0;
        for _ in 0..idx {
            assert!(at < self.buf.len(), "grapheme index out of bounds");
            at = segment::next_grapheme_boundary(self.buf.as_str(), at);
        }
        at
    }

    /// Insert `text` at byte offset `at`, then recompose the boundary.
    ///
    /// Panics if `at` is out of bounds or not on a char boundary.
    pub fn insert(&mut self, at: usize, text: &str) {
        assert!(self.buf.is_char_boundary(at), "insert offset not on a char boundary");
        if text.is_empty() {
            return;
        }
        let ins = normalize(text);
        let ins_len = ins.len();
        self.buf.insert_str(at, &ins);
        self.renormalize_window(at, at + ins_len);
    }

    /// Remove `range`, then recompose the join.
    ///
    /// Panics if the range is out of bounds, decreasing, or off char
    /// boundaries.
    pub fn remove(&mut self, range: Range<usize>) {
        assert!(range.start <= range.end, "decreasing byte range");
        assert!(
            self.buf.is_char_boundary(range.start) && self.buf.is_char_boundary(range.end),
            "remove range not on char boundaries"
        );
        if range.start == range.end {
            return;
        }
        let at = range.start;
        self.buf.replace_range(range, "");
        self.renormalize_window(at, at);
    }

    /// Replace `range` with `text`. Equivalent to a remove plus an insert,
    /// with a single renormalization pass over the splice window.
    pub fn replace(&mut self, range: Range<usize>, text: &str) {
        assert!(range.start <= range.end, "decreasing byte range");
        assert!(
            self.buf.is_char_boundary(range.start) && self.buf.is_char_boundary(range.end),
            "replace range not on char boundaries"
        );
        let at = range.start;
        let ins = normalize(text);
        let ins_len = ins.len();
        self.buf.replace_range(range, &ins);
        self.renormalize_window(at, at + ins_len);
    }

    /// Append, reusing the insert path (and its boundary recomposition).
    pub fn push_str(&mut self, text: &str) {
        self.insert(self.buf.len(), text);
    }

    /// Recompose `[lo, hi)` extended outward to the surrounding grapheme
    /// boundaries. The spliced-in content is already composed internally, so
    /// this only has work to do when characters interact across the seams.
    fn renormalize_window(&mut self, lo: usize, hi: usize) {
        let ws = segment::prev_grapheme_boundary(self.buf.as_str(), lo);
        let we = segment::next_grapheme_boundary(self.buf.as_str(), hi);
        if ws == we {
            return;
        }
        if let Some(repl) = renormalized(&self.buf[ws..we]) {
            self.buf.replace_range(ws..we, &repl);
        }
    }

    // Byte-level splicers for the rope's leaf machinery. These bypass
    // normalization: the tree only slices at char boundaries of content
    // whose composition is handled a level up.

    pub(crate) fn truncate_bytes(&mut self, at: usize) {
        self.buf.truncate(at);
    }

    pub(crate) fn remove_prefix_bytes(&mut self, at: usize) {
        self.buf.replace_range(..at, "");
    }

    pub(crate) fn remove_bytes(&mut self, range: Range<usize>) {
        self.buf.replace_range(range, "");
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text { buf: normalize(s).into_owned() }
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        let composed = match normalize(&s) {
            // Already composed: keep the allocation.
            Cow::Borrowed(_) => None,
            Cow::Owned(n) => Some(n),
        };
        match composed {
            None => Text { buf: s },
            Some(n) => Text { buf: n },
        }
    }
}

impl From<Text> for String {
    fn from(t: Text) -> Self {
        t.buf
    }
}

impl AsRef<str> for Text {
    fn as_ref(&self) -> &str {
        &self.buf
    }
}

impl std::borrow::Borrow<str> for Text {
    fn borrow(&self) -> &str {
        &self.buf
    }
}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        self.buf == other
    }
}

impl PartialEq<&str> for Text {
    fn eq(&self, other: &&str) -> bool {
        self.buf == *other
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buf)
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Text({:?})", self.buf)
    }
}

impl FromIterator<char> for Text {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        Text::from(iter.into_iter().collect::<String>())
    }
}
