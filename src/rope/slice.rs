//! Views: a byte-range window into a rope, and the repeated-segment view.

use std::fmt;
use std::ops::Range;

use smartstring::alias::String as SmartString;

use crate::normalize::normalize;
use crate::segment::{self, ChunkSource};

use super::{Chars, CharsRev, Chunks, Graphemes, GraphemesRev, Rope};

/// One segment of text observed `count` times.
///
/// A rope built from this stores the segment once, however large the count;
/// slicing on period boundaries just changes the count. Slicing mid-period
/// materializes real text.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RepeatedText {
    segment: SmartString,
    count: usize,
}

impl RepeatedText {
    /// `segment` is composed on the way in, like all stored text.
    pub fn new(segment: &str, count: usize) -> Self {
        let seg = normalize(segment);
        RepeatedText { segment: SmartString::from(seg.as_ref()), count }
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn len_bytes(&self) -> usize {
        self.segment.len() * self.count
    }

    pub(crate) fn with_count(&self, count: usize) -> Self {
        RepeatedText { segment: self.segment.clone(), count }
    }

    pub(crate) fn set_count(&mut self, count: usize) {
        self.count = count;
    }
}

/// An immutable view of a byte range of a [`Rope`].
///
/// Cheap to copy (two offsets and a borrow). [`RopeSlice::to_rope`] turns a
/// view into an independent rope that shares storage with the original
/// instead of copying it.
#[derive(Copy, Clone)]
pub struct RopeSlice<'a> {
    pub(crate) rope: &'a Rope,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

impl<'a> RopeSlice<'a> {
    pub fn len_bytes(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The byte range this view covers in the underlying rope.
    pub fn byte_range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len_chars(&self) -> usize {
        self.chunks().map(str_indices::chars::count).sum()
    }

    pub fn len_utf16(&self) -> usize {
        self.chunks().map(str_indices::utf16::count).sum()
    }

    /// Grapheme cluster count, segmented within this view's bounds. O(n).
    pub fn len_graphemes(&self) -> usize {
        self.graphemes().count()
    }

    pub fn chunks(&self) -> Chunks<'a> {
        Chunks { root: self.rope.root.as_ref(), pos: self.start, end: self.end }
    }

    pub fn chars(&self) -> Chars<'a> {
        Chars { chunks: self.chunks(), cur: "".chars() }
    }

    pub fn chars_rev(&self) -> CharsRev<'a> {
        CharsRev {
            root: self.rope.root.as_ref(),
            start: self.start,
            pos: self.end,
            cur: "".chars(),
        }
    }

    pub fn graphemes(&self) -> Graphemes<'a> {
        Graphemes { slice: *self, pos: 0 }
    }

    pub fn graphemes_rev(&self) -> GraphemesRev<'a> {
        GraphemesRev { slice: *self, pos: self.end - self.start }
    }

    /// Subslice, with offsets relative to this view.
    pub fn slice(&self, range: Range<usize>) -> RopeSlice<'a> {
        assert!(range.start <= range.end && range.end <= self.len_bytes(), "slice out of bounds");
        let start = self.start + range.start;
        let end = self.start + range.end;
        assert!(
            self.rope.is_char_boundary(start) && self.rope.is_char_boundary(end),
            "slice bounds off char boundaries"
        );
        RopeSlice { rope: self.rope, start, end }
    }

    /// An independent rope with this view's content, sharing storage with
    /// the underlying rope rather than copying it.
    pub fn to_rope(&self) -> Rope {
        let mut rope = self.rope.clone();
        let len = rope.len_bytes();
        rope.erase_raw(self.end, len);
        rope.erase_raw(0, self.start);
        rope
    }

    pub fn to_text(&self) -> crate::Text {
        crate::Text::from(self.to_string())
    }
}

impl ChunkSource for RopeSlice<'_> {
    fn len_bytes(&self) -> usize {
        self.end - self.start
    }

    fn chunk_at(&self, at: usize) -> (&str, usize) {
        debug_assert!(at <= self.end - self.start);
        let (chunk, chunk_start) = self.rope.chunk_at_byte(self.start + at);
        // Trim the chunk to this view's bounds and shift to view-relative
        // offsets.
        let lo = self.start.max(chunk_start);
        let hi = self.end.min(chunk_start + chunk.len());
        (&chunk[lo - chunk_start..hi - chunk_start], lo - self.start)
    }
}

impl fmt::Display for RopeSlice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

impl fmt::Debug for RopeSlice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RopeSlice(")?;
        fmt::Debug::fmt(&self.to_string(), f)?;
        write!(f, ")")
    }
}

impl PartialEq for RopeSlice<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.len_bytes() == other.len_bytes()
            && self
                .chunks()
                .flat_map(|c| c.bytes())
                .eq(other.chunks().flat_map(|c| c.bytes()))
    }
}

impl Eq for RopeSlice<'_> {}

impl PartialEq<str> for RopeSlice<'_> {
    fn eq(&self, other: &str) -> bool {
        if self.len_bytes() != other.len() {
            return false;
        }
        let mut pos = 0;
        for chunk in self.chunks() {
            if !other.as_bytes()[pos..pos + chunk.len()].eq(chunk.as_bytes()) {
                return false;
            }
            pos += chunk.len();
        }
        true
    }
}

impl PartialEq<&str> for RopeSlice<'_> {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

/// The next-boundary walkers for slices, with offsets relative to the view.
impl RopeSlice<'_> {
    pub fn is_char_boundary(&self, at: usize) -> bool {
        at <= self.len_bytes() && self.rope.is_char_boundary(self.start + at)
    }

    pub fn is_grapheme_boundary(&self, at: usize) -> bool {
        assert!(self.is_char_boundary(at), "offset not on a char boundary");
        segment::is_grapheme_boundary(self, at)
    }

    pub fn next_grapheme_boundary(&self, at: usize) -> usize {
        assert!(self.is_char_boundary(at), "offset not on a char boundary");
        segment::next_grapheme_boundary(self, at)
    }

    pub fn prev_grapheme_boundary(&self, at: usize) -> usize {
        assert!(self.is_char_boundary(at), "offset not on a char boundary");
        segment::prev_grapheme_boundary(self, at)
    }
}
