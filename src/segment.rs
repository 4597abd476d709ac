//! Grapheme cluster boundary lookup over chunked storage.
//!
//! `GraphemeCursor` does the actual segmentation; this module drives its
//! chunked protocol, feeding it whichever chunk it asks for. The same code
//! serves contiguous `&str` (one big chunk) and ropes (one chunk per leaf
//! segment) through the [`ChunkSource`] seam.

use unicode_segmentation::{GraphemeCursor, GraphemeIncomplete};

/// Storage that can hand out the chunk covering a given byte offset.
pub(crate) trait ChunkSource {
    fn len_bytes(&self) -> usize;

    /// The chunk containing byte `at` and its starting offset. `at` may
    /// equal `len_bytes()`, in which case the last chunk is returned.
    fn chunk_at(&self, at: usize) -> (&str, usize);
}

impl ChunkSource for str {
    fn len_bytes(&self) -> usize {
        self.len()
    }

    fn chunk_at(&self, _at: usize) -> (&str, usize) {
        (self, 0)
    }
}

/// The first grapheme boundary strictly after `at`, or `len_bytes()` if none.
pub(crate) fn next_grapheme_boundary<S: ChunkSource + ?Sized>(src: &S, at: usize) -> usize {
    let len = src.len_bytes();
    debug_assert!(at <= len);
    if at >= len {
        return len;
    }
    let mut cursor = GraphemeCursor::new(at, len, true);
    let (mut chunk, mut chunk_start) = src.chunk_at(at);
    loop {
        match cursor.next_boundary(chunk, chunk_start) {
            Ok(None) => return len,
            Ok(Some(boundary)) => return boundary,
            Err(GraphemeIncomplete::NextChunk) => {
                let next_start = chunk_start + chunk.len();
                let (c, s) = src.chunk_at(next_start);
                chunk = c;
                chunk_start = s;
            }
            Err(GraphemeIncomplete::PreContext(n)) => {
                let (c, s) = src.chunk_at(n - 1);
                cursor.provide_context(c, s);
            }
            Err(_) => unreachable!("cursor fed with in-bounds chunks"),
        }
    }
}

/// The last grapheme boundary strictly before `at`, or 0 if none.
pub(crate) fn prev_grapheme_boundary<S: ChunkSource + ?Sized>(src: &S, at: usize) -> usize {
    let len = src.len_bytes();
    debug_assert!(at <= len);
    if at == 0 {
        return 0;
    }
    let mut cursor = GraphemeCursor::new(at, len, true);
    let (mut chunk, mut chunk_start) = src.chunk_at(at);
    loop {
        match cursor.prev_boundary(chunk, chunk_start) {
            Ok(None) => return 0,
            Ok(Some(boundary)) => return boundary,
            Err(GraphemeIncomplete::PrevChunk) => {
                let (c, s) = src.chunk_at(chunk_start - 1);
                chunk = c;
                chunk_start = s;
            }
            Err(GraphemeIncomplete::PreContext(n)) => {
                let (c, s) = src.chunk_at(n - 1);
                cursor.provide_context(c, s);
            }
            Err(_) => unreachable!("cursor fed with in-bounds chunks"),
        }
    }
}

pub(crate) fn is_grapheme_boundary<S: ChunkSource + ?Sized>(src: &S, at: usize) -> bool {
    let len = src.len_bytes();
    debug_assert!(at <= len);
    if at == 0 || at == len {
        return true;
    }
    let mut cursor = GraphemeCursor::new(at, len, true);
    let (chunk, chunk_start) = src.chunk_at(at);
    loop {
        match cursor.is_boundary(chunk, chunk_start) {
            Ok(b) => return b,
            Err(GraphemeIncomplete::PreContext(n)) => {
                let (c, s) = src.chunk_at(n - 1);
                cursor.provide_context(c, s);
            }
            Err(_) => unreachable!("cursor fed with in-bounds chunks"),
        }
    }
}
