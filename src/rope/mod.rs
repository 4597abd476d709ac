//! The rope itself: a persistent sequence of canonically composed text.
//!
//! A [`Rope`] is a handle to the root of a refcounted B-tree. Cloning is
//! O(1); editing copies only the path from the root to the touched leaf and
//! shares the rest, so a clone taken before an edit remains a fully usable,
//! unchanged version. With the `sync` feature (default), versions can be
//! read from any number of threads at once.
//!
//! Offsets in the public API are byte offsets and must land on `char`
//! boundaries, like [`String`]. Edits keep the stored text composed by
//! renormalizing the grapheme-bounded window around each splice; a grapheme
//! cluster that would straddle a leaf seam is collapsed into one owned leaf
//! when that happens.

mod slice;

use std::fmt;
use std::ops::Range;

use crate::error::InvalidEncoding;
use crate::normalize::{normalize, renormalized};
use crate::segment::{self, ChunkSource};
use crate::text::Text;
use crate::tree::{self, leaf::make_node, Leaf, NodeHandle};
use crate::Shared;

pub use slice::{RepeatedText, RopeSlice};

/// A persistent rope of canonically composed UTF-8 text.
///
/// ```
/// use cordage::Rope;
///
/// let mut r = Rope::from("string");
/// let before = r.clone(); // O(1)
/// r.remove(1..3);
/// assert_eq!(r, "sing");
/// assert_eq!(before, "string"); // the old version is untouched
/// ```
#[derive(Clone, Default)]
pub struct Rope {
    root: Option<NodeHandle>,
}

impl Rope {
    pub fn new() -> Self {
        Rope { root: None }
    }

    /// Zero-copy construction from a string literal (or any other static
    /// string), as long as it is already composed; otherwise the composed
    /// form is allocated.
    pub fn from_static(s: &'static str) -> Self {
        if s.is_empty() {
            return Rope::new();
        }
        match normalize(s) {
            std::borrow::Cow::Borrowed(_) => Rope { root: Some(make_node(Leaf::Static(s))) },
            std::borrow::Cow::Owned(n) => {
                Rope { root: Some(make_node(Leaf::Owned(Text::from_normalized(n)))) }
            }
        }
    }

    /// A rope observing `rep.segment()` repeated `rep.count()` times,
    /// without expanding the repetition.
    ///
    /// If copies of the segment would interact under composition (the
    /// segment ends with a base its own leading mark would join), the
    /// repetition can't be stored as a view and is expanded instead.
    pub fn from_repeated(rep: RepeatedText) -> Self {
        if rep.count() == 0 || rep.segment().is_empty() {
            return Rope::new();
        }
        let doubled: String = [rep.segment(), rep.segment()].concat();
        if renormalized(&doubled).is_some() {
            let expanded: String = std::iter::repeat(rep.segment()).take(rep.count()).collect();
            return Rope::from(expanded);
        }
        Rope { root: Some(make_node(Leaf::Repeated(rep))) }
    }

    /// Strict UTF-8 constructor; also rejects noncharacters.
    pub fn from_utf8(bytes: &[u8]) -> Result<Self, InvalidEncoding> {
        Ok(Rope::from(Text::from_utf8(bytes)?))
    }

    /// Lossy UTF-8 constructor; ill-formed subsequences become U+FFFD.
    pub fn from_utf8_lossy(bytes: &[u8]) -> Self {
        Rope::from(Text::from_utf8_lossy(bytes))
    }

    /// Strict UTF-16 constructor.
    pub fn from_utf16(units: &[u16]) -> Result<Self, InvalidEncoding> {
        Ok(Rope::from(Text::from_utf16(units)?))
    }

    /// Lossy UTF-16 constructor; unpaired surrogates become U+FFFD.
    pub fn from_utf16_lossy(units: &[u16]) -> Self {
        Rope::from(Text::from_utf16_lossy(units))
    }

    pub fn len_bytes(&self) -> usize {
        match &self.root {
            Some(root) => root.size(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn len_chars(&self) -> usize {
        self.chunks().map(str_indices::chars::count).sum()
    }

    /// Length in UTF-16 code units.
    pub fn len_utf16(&self) -> usize {
        self.chunks().map(str_indices::utf16::count).sum()
    }

    /// Grapheme cluster count. O(n).
    pub fn len_graphemes(&self) -> usize {
        self.graphemes().count()
    }

    /// True when both ropes share the same root node, which makes them
    /// equal in O(1). Versions stay root-identical until one is edited.
    pub fn ptr_eq(&self, other: &Rope) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Shared::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    /// The chunk containing byte `at` and the offset at which it starts.
    pub fn chunk_at_byte(&self, at: usize) -> (&str, usize) {
        match &self.root {
            Some(root) => tree::ops::chunk_at(root, at),
            None => ("", 0),
        }
    }

    pub fn byte(&self, at: usize) -> u8 {
        assert!(at < self.len_bytes(), "byte index out of bounds");
        let (chunk, start) = self.chunk_at_byte(at);
        chunk.as_bytes()[at - start]
    }

    pub fn char_at(&self, at: usize) -> char {
        assert!(self.is_char_boundary(at) && at < self.len_bytes(), "not a char position");
        let (chunk, start) = self.chunk_at_byte(at);
        match chunk[at - start..].chars().next() {
            Some(c) => c,
            None => unreachable!(),
        }
    }

    /// Like [`str::is_char_boundary`]: true at the ends, false out of
    /// bounds or inside a code point's encoding.
    pub fn is_char_boundary(&self, at: usize) -> bool {
        let len = self.len_bytes();
        if at == 0 || at == len {
            return true;
        }
        if at > len {
            return false;
        }
        let (chunk, start) = self.chunk_at_byte(at);
        chunk.is_char_boundary(at - start)
    }

    pub fn is_grapheme_boundary(&self, at: usize) -> bool {
        assert!(self.is_char_boundary(at), "offset not on a char boundary");
        segment::is_grapheme_boundary(self, at)
    }

    /// The first grapheme boundary strictly after `at` (or the end).
    pub fn next_grapheme_boundary(&self, at: usize) -> usize {
        assert!(self.is_char_boundary(at), "offset not on a char boundary");
        segment::next_grapheme_boundary(self, at)
    }

    /// The last grapheme boundary strictly before `at` (or 0).
    pub fn prev_grapheme_boundary(&self, at: usize) -> usize {
        assert!(self.is_char_boundary(at), "offset not on a char boundary");
        segment::prev_grapheme_boundary(self, at)
    }

    /// Byte offset of the grapheme cluster with index `idx`. `idx` may
    /// equal `len_graphemes()`, giving the end.
    pub fn grapheme_to_byte(&self, idx: usize) -> usize {
        let mut at = 0;
        for _ in 0..idx {
            assert!(at < self.len_bytes(), "grapheme index out of bounds");
            at = segment::next_grapheme_boundary(self, at);
        }
        at
    }

    pub fn char_to_byte(&self, char_idx: usize) -> usize {
        let mut rem = char_idx;
        let mut base = 0;
        for chunk in self.chunks() {
            let n = str_indices::chars::count(chunk);
            if rem < n {
                return base + str_indices::chars::to_byte_idx(chunk, rem);
            }
            rem -= n;
            base += chunk.len();
        }
        assert_eq!(rem, 0, "char index out of bounds");
        base
    }

    pub fn byte_to_char(&self, byte_idx: usize) -> usize {
        assert!(byte_idx <= self.len_bytes(), "byte index out of bounds");
        let mut chars = 0;
        let mut base = 0;
        for chunk in self.chunks() {
            if byte_idx < base + chunk.len() {
                return chars + str_indices::chars::from_byte_idx(chunk, byte_idx - base);
            }
            chars += str_indices::chars::count(chunk);
            base += chunk.len();
        }
        chars
    }

    // ------ iteration ------

    pub fn chunks(&self) -> Chunks<'_> {
        Chunks { root: self.root.as_ref(), pos: 0, end: self.len_bytes() }
    }

    pub fn chars(&self) -> Chars<'_> {
        Chars { chunks: self.chunks(), cur: "".chars() }
    }

    /// Code points from the back. `chars_rev()` yields what
    /// `chars().rev()` would, without needing to buffer the rope.
    pub fn chars_rev(&self) -> CharsRev<'_> {
        CharsRev { root: self.root.as_ref(), start: 0, pos: self.len_bytes(), cur: "".chars() }
    }

    pub fn char_indices(&self) -> CharIndices<'_> {
        CharIndices { chars: self.chars(), offset: 0 }
    }

    /// Grapheme clusters, each as a [`RopeSlice`] view.
    pub fn graphemes(&self) -> Graphemes<'_> {
        Graphemes { slice: self.slice(0..self.len_bytes()), pos: 0 }
    }

    pub fn graphemes_rev(&self) -> GraphemesRev<'_> {
        let len = self.len_bytes();
        GraphemesRev { slice: self.slice(0..len), pos: len }
    }

    /// A view of the byte range. Bounds must be char boundaries.
    pub fn slice(&self, range: Range<usize>) -> RopeSlice<'_> {
        assert!(range.start <= range.end && range.end <= self.len_bytes(), "slice out of bounds");
        assert!(
            self.is_char_boundary(range.start) && self.is_char_boundary(range.end),
            "slice bounds off char boundaries"
        );
        RopeSlice { rope: self, start: range.start, end: range.end }
    }

    pub fn to_text(&self) -> Text {
        Text::from(self.to_string())
    }

    // ------ edits ------

    /// Insert `text` at byte offset `at`.
    ///
    /// The inserted text is composed, and so is the seam: inserting a
    /// combining mark right after a base character merges them into one
    /// cluster. Panics if `at` is out of bounds or off a char boundary.
    pub fn insert(&mut self, at: usize, text: &str) {
        assert!(at <= self.len_bytes(), "insert offset out of bounds");
        assert!(self.is_char_boundary(at), "insert offset not on a char boundary");
        if text.is_empty() {
            return;
        }
        let ins = normalize(text);
        let ins_len = ins.len();
        self.insert_leaf_at(at, make_node(Leaf::Owned(Text::from_normalized(ins.into_owned()))));
        self.renormalize_boundary(at + ins_len);
        self.renormalize_boundary(at);
    }

    /// Insert an owned [`Text`], reusing its buffer as a leaf.
    pub fn insert_text(&mut self, at: usize, text: Text) {
        assert!(at <= self.len_bytes(), "insert offset out of bounds");
        assert!(self.is_char_boundary(at), "insert offset not on a char boundary");
        if text.is_empty() {
            return;
        }
        let len = text.len_bytes();
        self.insert_leaf_at(at, make_node(Leaf::Owned(text)));
        self.renormalize_boundary(at + len);
        self.renormalize_boundary(at);
    }

    /// Insert another rope's content, sharing its leaves instead of copying
    /// them.
    pub fn insert_rope(&mut self, at: usize, other: &Rope) {
        assert!(at <= self.len_bytes(), "insert offset out of bounds");
        assert!(self.is_char_boundary(at), "insert offset not on a char boundary");
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }
        let total = other.len_bytes();
        let mut handles = Vec::new();
        if let Some(root) = &other.root {
            let mut pos = 0;
            while pos < total {
                let (leaf, off) = tree::ops::find_leaf(root, pos);
                debug_assert_eq!(off, 0);
                handles.push(leaf.clone());
                pos += leaf.size();
            }
        }
        let mut pos = at;
        for leaf in handles {
            let len = leaf.size();
            self.insert_leaf_at(pos, leaf);
            pos += len;
        }
        self.renormalize_boundary(at + total);
        self.renormalize_boundary(at);
    }

    /// Append, sharing the other rope's leaves.
    pub fn append(&mut self, other: &Rope) {
        self.insert_rope(self.len_bytes(), other);
    }

    /// Remove a byte range. Bounds must be char boundaries.
    pub fn remove(&mut self, range: Range<usize>) {
        assert!(range.start <= range.end && range.end <= self.len_bytes(), "remove out of bounds");
        assert!(
            self.is_char_boundary(range.start) && self.is_char_boundary(range.end),
            "remove range off char boundaries"
        );
        if range.start == range.end {
            return;
        }
        let at = range.start;
        self.erase_raw(range.start, range.end);
        self.renormalize_boundary(at);
    }

    /// Replace a byte range with `text`.
    pub fn replace(&mut self, range: Range<usize>, text: &str) {
        assert!(range.start <= range.end && range.end <= self.len_bytes(), "replace out of bounds");
        assert!(
            self.is_char_boundary(range.start) && self.is_char_boundary(range.end),
            "replace range off char boundaries"
        );
        let at = range.start;
        if range.start != range.end {
            self.erase_raw(range.start, range.end);
        }
        if !text.is_empty() {
            let ins = normalize(text);
            let ins_len = ins.len();
            self.insert_leaf_at(at, make_node(Leaf::Owned(Text::from_normalized(ins.into_owned()))));
            self.renormalize_boundary(at + ins_len);
        }
        self.renormalize_boundary(at);
    }

    /// Split at `at`, keeping `[0, at)` and returning `[at, len)`. Both
    /// sides share storage with the original version.
    pub fn split_off(&mut self, at: usize) -> Rope {
        assert!(at <= self.len_bytes(), "split offset out of bounds");
        assert!(self.is_char_boundary(at), "split offset not on a char boundary");
        let len = self.len_bytes();
        let tail = self.slice(at..len).to_rope();
        self.erase_raw(at, len);
        tail
    }

    /// Walk the whole tree checking structural invariants. For tests.
    #[doc(hidden)]
    pub fn dbg_check(&self) {
        if let Some(root) = &self.root {
            tree::dbg_check(root);
        }
    }

    // ------ internals ------

    fn insert_leaf_at(&mut self, at: usize, node: NodeHandle) {
        self.root = Some(tree::ops::insert(self.root.take(), at, node));
    }

    pub(crate) fn erase_raw(&mut self, lo: usize, hi: usize) {
        self.root = tree::ops::erase(self.root.take(), lo, hi);
    }

    /// Recompose the grapheme-bounded window around byte `at`. This is
    /// where a cluster straddling a leaf seam gets collapsed into a single
    /// owned leaf: the window is cut out and re-inserted whole, but only
    /// when composition actually changed it.
    fn renormalize_boundary(&mut self, at: usize) {
        let len = self.len_bytes();
        if len == 0 {
            return;
        }
        let mut at = at.min(len);
        while !self.is_char_boundary(at) {
            at -= 1;
        }
        let ws = segment::prev_grapheme_boundary(&*self, at);
        let we = segment::next_grapheme_boundary(&*self, at);
        if ws == we {
            return;
        }
        let window = self.collect_string(ws, we);
        if let Some(repl) = renormalized(&window) {
            self.erase_raw(ws, we);
            if !repl.is_empty() {
                self.insert_leaf_at(ws, make_node(Leaf::Owned(Text::from_normalized(repl))));
            }
        }
    }

    fn collect_string(&self, lo: usize, hi: usize) -> String {
        let mut s = String::with_capacity(hi - lo);
        let chunks = Chunks { root: self.root.as_ref(), pos: lo, end: hi };
        for chunk in chunks {
            s.push_str(chunk);
        }
        s
    }
}

impl ChunkSource for Rope {
    fn len_bytes(&self) -> usize {
        Rope::len_bytes(self)
    }

    fn chunk_at(&self, at: usize) -> (&str, usize) {
        self.chunk_at_byte(at)
    }
}

impl From<&str> for Rope {
    fn from(s: &str) -> Self {
        Rope::from(Text::from(s))
    }
}

impl From<String> for Rope {
    fn from(s: String) -> Self {
        Rope::from(Text::from(s))
    }
}

impl From<Text> for Rope {
    fn from(t: Text) -> Self {
        if t.is_empty() {
            Rope::new()
        } else {
            Rope { root: Some(make_node(Leaf::Owned(t))) }
        }
    }
}

impl From<RepeatedText> for Rope {
    fn from(rep: RepeatedText) -> Self {
        Rope::from_repeated(rep)
    }
}

impl From<&Rope> for String {
    fn from(r: &Rope) -> Self {
        r.to_string()
    }
}

impl FromIterator<char> for Rope {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        Rope::from(iter.into_iter().collect::<String>())
    }
}

impl fmt::Display for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Rope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rope(")?;
        fmt::Debug::fmt(&self.to_string(), f)?;
        write!(f, ")")
    }
}

impl PartialEq for Rope {
    fn eq(&self, other: &Self) -> bool {
        if self.len_bytes() != other.len_bytes() {
            return false;
        }
        if self.ptr_eq(other) {
            return true;
        }
        self.chunks()
            .flat_map(|c| c.bytes())
            .eq(other.chunks().flat_map(|c| c.bytes()))
    }
}

impl Eq for Rope {}

impl PartialEq<str> for Rope {
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

impl PartialEq<&str> for Rope {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl PartialEq<String> for Rope {
    fn eq(&self, other: &String) -> bool {
        *self == **other
    }
}

/// Contiguous chunks of a rope (one per leaf segment), in order.
#[derive(Clone)]
pub struct Chunks<'a> {
    root: Option<&'a NodeHandle>,
    pos: usize,
    end: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.pos >= self.end {
            return None;
        }
        let root = self.root?;
        let (chunk, start) = tree::ops::chunk_at(root, self.pos);
        let lo = self.pos - start;
        let hi = chunk.len().min(self.end - start);
        self.pos = start + hi;
        Some(&chunk[lo..hi])
    }
}

/// Code points of a rope (or rope slice), front to back.
#[derive(Clone)]
pub struct Chars<'a> {
    chunks: Chunks<'a>,
    cur: std::str::Chars<'a>,
}

impl<'a> Iterator for Chars<'a> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        loop {
            if let Some(c) = self.cur.next() {
                return Some(c);
            }
            self.cur = self.chunks.next()?.chars();
        }
    }
}

/// Code points, back to front.
#[derive(Clone)]
pub struct CharsRev<'a> {
    root: Option<&'a NodeHandle>,
    start: usize,
    pos: usize,
    cur: std::str::Chars<'a>,
}

impl<'a> Iterator for CharsRev<'a> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        loop {
            if let Some(c) = self.cur.next_back() {
                self.pos -= c.len_utf8();
                return Some(c);
            }
            if self.pos <= self.start {
                return None;
            }
            let root = self.root?;
            let (chunk, chunk_start) = tree::ops::chunk_at(root, self.pos - 1);
            let lo = self.start.max(chunk_start);
            self.cur = chunk[lo - chunk_start..self.pos - chunk_start].chars();
        }
    }
}

/// `(byte_offset, char)` pairs, like [`str::char_indices`].
#[derive(Clone)]
pub struct CharIndices<'a> {
    chars: Chars<'a>,
    offset: usize,
}

impl<'a> Iterator for CharIndices<'a> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<(usize, char)> {
        let c = self.chars.next()?;
        let at = self.offset;
        self.offset += c.len_utf8();
        Some((at, c))
    }
}

/// Grapheme clusters, each yielded as a [`RopeSlice`] so clusters spanning
/// leaf seams need no copying.
#[derive(Clone)]
pub struct Graphemes<'a> {
    slice: RopeSlice<'a>,
    pos: usize,
}

impl<'a> Iterator for Graphemes<'a> {
    type Item = RopeSlice<'a>;

    fn next(&mut self) -> Option<RopeSlice<'a>> {
        if self.pos >= self.slice.len_bytes() {
            return None;
        }
        let next = segment::next_grapheme_boundary(&self.slice, self.pos);
        let g = self.slice.slice(self.pos..next);
        self.pos = next;
        Some(g)
    }
}

/// Grapheme clusters, back to front.
#[derive(Clone)]
pub struct GraphemesRev<'a> {
    slice: RopeSlice<'a>,
    pos: usize,
}

impl<'a> Iterator for GraphemesRev<'a> {
    type Item = RopeSlice<'a>;

    fn next(&mut self) -> Option<RopeSlice<'a>> {
        if self.pos == 0 {
            return None;
        }
        let prev = segment::prev_grapheme_boundary(&self.slice, self.pos);
        let g = self.slice.slice(prev..self.pos);
        self.pos = prev;
        Some(g)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    use crate::tree::Node;

    use super::*;

    fn leaf_ptrs(r: &Rope) -> Vec<*const Node> {
        let mut v = Vec::new();
        if let Some(root) = &r.root {
            let total = root.size();
            let mut pos = 0;
            while pos < total {
                let (leaf, off) = tree::ops::find_leaf(root, pos);
                assert_eq!(off, 0);
                v.push(Shared::as_ptr(leaf));
                pos += leaf.size();
            }
        }
        v
    }

    fn leaf_kinds(r: &Rope) -> Vec<&'static str> {
        let mut v = Vec::new();
        if let Some(root) = &r.root {
            let total = root.size();
            let mut pos = 0;
            while pos < total {
                let (leaf, _off) = tree::ops::find_leaf(root, pos);
                v.push(match leaf.as_leaf() {
                    Leaf::Owned(_) => "owned",
                    Leaf::Static(_) => "static",
                    Leaf::Repeated(_) => "repeated",
                    Leaf::Ref(_) => "ref",
                });
                pos += leaf.size();
            }
        }
        v
    }

    #[test]
    fn empty_rope() {
        let r = Rope::new();
        assert!(r.is_empty());
        assert_eq!(r.len_bytes(), 0);
        assert_eq!(r.len_chars(), 0);
        assert_eq!(r.len_graphemes(), 0);
        assert_eq!(r.to_string(), "");
        assert_eq!(r, "");
        assert!(r.chunks().next().is_none());
        assert!(r.chars().next().is_none());
        r.dbg_check();
    }

    #[test]
    fn erase_range_of_chars() {
        let mut r = Rope::from("string");
        r.remove(1..3);
        assert_eq!(r, "sing");
        assert_eq!(r.len_bytes(), 4);
        assert_eq!(r.len_graphemes(), 4);
        r.dbg_check();
    }

    #[test]
    fn old_versions_survive_edits() {
        let r0 = Rope::from("the quick brown fox");
        let mut r1 = r0.clone();
        assert!(r0.ptr_eq(&r1));

        r1.insert(4, "lazy ");
        assert!(!r0.ptr_eq(&r1));
        assert_eq!(r1, "the lazy quick brown fox");
        assert_eq!(r0, "the quick brown fox");
        r0.dbg_check();
        r1.dbg_check();
    }

    #[test]
    fn insert_then_erase_round_trips() {
        let r0 = Rope::from("the quick brown fox");
        let mut r1 = r0.clone();
        r1.insert(4, "lazy ");
        let mut r2 = r1.clone();
        r2.remove(4..9);
        assert_eq!(r2, r0);
        r2.dbg_check();
    }

    #[test]
    fn append_driven_growth() {
        // One leaf per insert; enough to build a few interior levels.
        let pieces = ["a", "bc", "d", "ef", "g"];
        let mut r = Rope::new();
        let mut model = String::new();
        for i in 0..600 {
            let piece = pieces[i % pieces.len()];
            r.insert(r.len_bytes(), piece);
            model.push_str(piece);
            r.dbg_check();
        }
        assert_eq!(r, model.as_str());
        assert_eq!(r.len_bytes(), model.len());
        assert_eq!(r.len_chars(), model.chars().count());
    }

    #[test]
    fn prepend_driven_growth() {
        let mut r = Rope::new();
        let mut model = String::new();
        for i in 0..300 {
            let piece = if i % 3 == 0 { "ab" } else { "c" };
            r.insert(0, piece);
            model.insert_str(0, piece);
            r.dbg_check();
        }
        assert_eq!(r, model.as_str());
    }

    #[test]
    fn erase_left_spine_to_right_spine() {
        let mut r = Rope::new();
        for _ in 0..400 {
            r.insert(r.len_bytes(), "ab");
        }
        let len = r.len_bytes();
        r.remove(1..len - 1);
        assert_eq!(r, "ab");
        r.dbg_check();
    }

    #[test]
    fn erase_whole_leaves_and_collapse_root() {
        let mut r = Rope::new();
        for piece in ["a", "b", "c"] {
            r.insert(r.len_bytes(), piece);
        }
        assert_eq!(leaf_ptrs(&r).len(), 3);

        // Erase exactly the middle leaf.
        r.remove(1..2);
        assert_eq!(r, "ac");
        r.dbg_check();

        // Erase another whole leaf: the root collapses to a single leaf.
        r.remove(0..1);
        assert_eq!(r, "c");
        r.dbg_check();

        // And empty out entirely.
        r.remove(0..1);
        assert!(r.is_empty());
        r.dbg_check();
    }

    #[test]
    fn split_inside_a_leaf_makes_refs() {
        let mut r = Rope::from("abcdef");
        r.insert(3, "XY");
        assert_eq!(r, "abcXYdef");
        // The two halves of the original leaf are windows into it, not
        // copies.
        assert_eq!(leaf_kinds(&r), ["ref", "owned", "ref"]);
        r.dbg_check();
    }

    #[test]
    fn combining_mark_joins_across_leaf_seam() {
        let mut r = Rope::from("a");
        r.insert(1, "a"); // second leaf
        assert_eq!(leaf_ptrs(&r).len(), 2);

        let at = r.grapheme_to_byte(1);
        r.insert(at, "\u{0308}");
        assert_eq!(r.to_string().as_bytes(), [0xC3, 0xA4, 0x61]);
        assert_eq!(r, "äa");
        // One cluster was added to none: the mark joined the existing 'a'.
        assert_eq!(r.len_graphemes(), 2);
        r.dbg_check();
    }

    #[test]
    fn cluster_straddling_leaves_without_composition() {
        // Regional indicators don't compose, so the two leaves stay
        // separate and the grapheme iterator has to stitch them together.
        let mut r = Rope::from("x");
        r.insert(1, "\u{1F1E6}");
        r.insert(5, "\u{1F1FA}");
        r.insert(9, "y");
        assert_eq!(leaf_ptrs(&r).len(), 4);
        assert_eq!(r.len_graphemes(), 3);

        let gs: Vec<String> = r.graphemes().map(|g| g.to_string()).collect();
        assert_eq!(gs, ["x", "\u{1F1E6}\u{1F1FA}", "y"]);
        let rev: Vec<String> = r.graphemes_rev().map(|g| g.to_string()).collect();
        assert_eq!(rev, ["y", "\u{1F1E6}\u{1F1FA}", "x"]);

        assert!(r.is_grapheme_boundary(1));
        assert!(!r.is_grapheme_boundary(5));
        assert_eq!(r.next_grapheme_boundary(1), 9);
        assert_eq!(r.prev_grapheme_boundary(9), 1);
    }

    #[test]
    fn repeated_view_slicing() {
        // Period-aligned erase just adjusts the count.
        let mut r = Rope::from_repeated(RepeatedText::new("ab", 3));
        assert_eq!(r, "ababab");
        r.remove(2..4);
        assert_eq!(r, "abab");
        assert_eq!(leaf_kinds(&r), ["repeated", "repeated"]);
        r.dbg_check();

        // A mid-period cut can't stay a repetition; it materializes.
        let mut r = Rope::from_repeated(RepeatedText::new("ab", 3));
        r.remove(1..2);
        assert_eq!(r, "aabab");
        assert_eq!(leaf_kinds(&r), ["owned", "repeated"]);
        r.dbg_check();
    }

    #[test]
    fn repeated_view_with_composing_seam_expands() {
        // The segment's trailing 'a' would compose with the next copy's
        // leading mark, so this can't be stored as a repetition.
        let rep = RepeatedText::new("\u{0308}a", 3);
        let r = Rope::from_repeated(rep);
        assert_eq!(r, "\u{0308}ääa");
        assert_eq!(leaf_kinds(&r), ["owned"]);
        r.dbg_check();
    }

    #[test]
    fn static_leaves_are_zero_copy() {
        let r = Rope::from_static("hello static world");
        assert_eq!(leaf_kinds(&r), ["static"]);
        assert_eq!(r, "hello static world");

        // Not composed: falls back to an owned, composed leaf.
        let r = Rope::from_static("e\u{0301}clair");
        assert_eq!(leaf_kinds(&r), ["owned"]);
        assert_eq!(r, "éclair");
    }

    #[test]
    fn slices_and_to_rope() {
        let mut r = Rope::new();
        for piece in ["abc", "def", "ghi", "jkl"] {
            r.insert(r.len_bytes(), piece);
        }
        let s = r.slice(2..10);
        assert_eq!(s.len_bytes(), 8);
        assert_eq!(s, "cdefghij");
        assert_eq!(s.to_string(), "cdefghij");
        assert_eq!(s.len_chars(), 8);
        assert_eq!(s.slice(1..4), "def");

        let sub = s.to_rope();
        assert_eq!(sub, "cdefghij");
        sub.dbg_check();
        // The middle leaves are shared with the original outright.
        let shared = leaf_ptrs(&sub)
            .iter()
            .filter(|p| leaf_ptrs(&r).contains(p))
            .count();
        assert!(shared >= 2, "slice copy should share interior leaves");
        // The original is untouched.
        assert_eq!(r, "abcdefghijkl");
    }

    #[test]
    fn divergence_shares_all_but_the_edited_path() {
        let mut r = Rope::new();
        for _ in 0..100 {
            r.insert(r.len_bytes(), "x");
        }
        let mut c = r.clone();
        c.insert(50, "Y");

        let originals = leaf_ptrs(&r);
        let shared = leaf_ptrs(&c)
            .iter()
            .filter(|p| originals.contains(p))
            .count();
        assert_eq!(leaf_ptrs(&c).len(), 101);
        assert!(shared >= 99, "only the edited path should unshare, got {shared}");
        assert_eq!(r.len_bytes(), 100);
        c.dbg_check();
        r.dbg_check();
    }

    #[test]
    fn insert_rope_shares_leaves() {
        let mut a = Rope::new();
        for _ in 0..20 {
            a.insert(a.len_bytes(), "aa");
        }
        let mut b = Rope::new();
        for _ in 0..10 {
            b.insert(b.len_bytes(), "bb");
        }
        a.insert_rope(4, &b);
        assert_eq!(a.len_bytes(), 60);
        assert_eq!(&a.to_string()[..28], "aaaabbbbbbbbbbbbbbbbbbbbaaaa");
        let b_leaves = leaf_ptrs(&b);
        let shared = leaf_ptrs(&a)
            .iter()
            .filter(|p| b_leaves.contains(p))
            .count();
        assert_eq!(shared, 10);
        a.dbg_check();

        let mut c = Rope::from("start ");
        c.append(&b);
        assert_eq!(c, "start bbbbbbbbbbbbbbbbbbbb");
        c.dbg_check();
    }

    #[test]
    fn split_off_shares_storage() {
        let mut r = Rope::from("hello world");
        let tail = r.split_off(5);
        assert_eq!(r, "hello");
        assert_eq!(tail, " world");
        r.dbg_check();
        tail.dbg_check();
        // Both sides window the original buffer.
        assert_eq!(leaf_kinds(&r), ["ref"]);
        assert_eq!(leaf_kinds(&tail), ["ref"]);
    }

    #[test]
    fn char_and_byte_indexing() {
        let mut r = Rope::new();
        for piece in ["aé", "日", "🙂b"] {
            r.insert(r.len_bytes(), piece);
        }
        assert_eq!(r.len_bytes(), 11);
        assert_eq!(r.len_chars(), 5);
        assert_eq!(r.len_utf16(), 6);

        assert_eq!(r.char_to_byte(0), 0);
        assert_eq!(r.char_to_byte(1), 1);
        assert_eq!(r.char_to_byte(2), 3);
        assert_eq!(r.char_to_byte(3), 6);
        assert_eq!(r.char_to_byte(4), 10);
        assert_eq!(r.char_to_byte(5), 11);

        assert_eq!(r.byte_to_char(0), 0);
        assert_eq!(r.byte_to_char(3), 2);
        assert_eq!(r.byte_to_char(6), 3);
        assert_eq!(r.byte_to_char(11), 5);

        assert_eq!(r.byte(0), b'a');
        assert_eq!(r.char_at(1), 'é');
        assert_eq!(r.char_at(3), '日');
        assert_eq!(r.char_at(6), '🙂');
        assert!(r.is_char_boundary(6));
        assert!(!r.is_char_boundary(7));
        assert!(!r.is_char_boundary(99));
    }

    #[test]
    fn char_iterators() {
        let mut r = Rope::new();
        for piece in ["aé", "日", "🙂b"] {
            r.insert(r.len_bytes(), piece);
        }
        let fwd: Vec<char> = r.chars().collect();
        assert_eq!(fwd, ['a', 'é', '日', '🙂', 'b']);

        let mut rev: Vec<char> = r.chars_rev().collect();
        rev.reverse();
        assert_eq!(rev, fwd);

        let idx: Vec<(usize, char)> = r.char_indices().collect();
        assert_eq!(idx, [(0, 'a'), (1, 'é'), (3, '日'), (6, '🙂'), (10, 'b')]);

        let s = r.slice(1..6);
        let in_slice: Vec<char> = s.chars().collect();
        assert_eq!(in_slice, ['é', '日']);
        let mut rev: Vec<char> = s.chars_rev().collect();
        rev.reverse();
        assert_eq!(rev, in_slice);
    }

    #[test]
    fn utf16_construction() {
        let units: Vec<u16> = "ab🙂".encode_utf16().collect();
        let r = Rope::from_utf16(&units).unwrap();
        assert_eq!(r, "ab🙂");
        assert_eq!(r.len_utf16(), 4);

        assert!(Rope::from_utf16(&[0x61, 0xDC00]).is_err());
        assert_eq!(Rope::from_utf16_lossy(&[0x61, 0xDC00]), "a\u{FFFD}");

        assert!(Rope::from_utf8(&[0xC0, 0x80]).is_err());
        assert_eq!(Rope::from_utf8_lossy(&[0x61, 0xC0, 0x80]), "a\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn replace_ranges() {
        let mut r = Rope::from("the quick brown fox");
        r.replace(4..9, "slow");
        assert_eq!(r, "the slow brown fox");
        r.replace(9..14, "");
        assert_eq!(r, "the slow  fox");
        r.replace(0..0, ">> ");
        assert_eq!(r, ">> the slow  fox");
        r.dbg_check();
    }

    // Model-checked fuzz over the raw tree operations (no normalization in
    // the way: ASCII content spliced at arbitrary byte offsets). Clones are
    // stashed along the way and re-checked at the end, which exercises the
    // copy-on-write paths hard.
    fn raw_splice_fuzz(seed: u64) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut rope = Rope::new();
        let mut model = String::new();
        let mut versions: Vec<(Rope, String)> = Vec::new();

        for i in 0..500 {
            if model.is_empty() || rng.gen_bool(0.6) {
                let pos = rng.gen_range(0..=model.len());
                let len = rng.gen_range(1..8);
                let s: String = (0..len)
                    .map(|_| (b'a' + rng.gen_range(0..26)) as char)
                    .collect();
                model.insert_str(pos, &s);
                rope.insert_leaf_at(pos, make_node(Leaf::Owned(Text::from(s.as_str()))));
            } else {
                let lo = rng.gen_range(0..=model.len());
                let hi = rng.gen_range(lo..=model.len());
                model.replace_range(lo..hi, "");
                rope.erase_raw(lo, hi);
            }
            rope.dbg_check();
            assert!(rope == model.as_str(), "divergence from model at step {i}");
            assert_eq!(rope.len_bytes(), model.len());

            if i % 50 == 0 {
                versions.push((rope.clone(), model.clone()));
            }
        }

        // Every stashed version must still read back exactly.
        for (r, m) in &versions {
            r.dbg_check();
            assert!(*r == m.as_str());
        }
    }

    #[cfg(feature = "sync")]
    #[test]
    fn versions_are_readable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Rope>();
        assert_send_sync::<Text>();

        let mut r = Rope::new();
        for _ in 0..50 {
            r.insert(r.len_bytes(), "chunk ");
        }
        let snapshot = r.clone();
        let expected = r.to_string();
        let reader = std::thread::spawn(move || {
            snapshot.dbg_check();
            snapshot.to_string()
        });
        // Keep editing while the other thread reads its version.
        r.insert(0, "local edits ");
        assert_eq!(reader.join().unwrap(), expected);
        r.dbg_check();
    }

    #[test]
    fn raw_tree_fuzz_once() {
        raw_splice_fuzz(0);
    }

    #[test]
    fn raw_tree_fuzz_seeds() {
        for seed in 1..12 {
            raw_splice_fuzz(seed);
        }
    }
}
