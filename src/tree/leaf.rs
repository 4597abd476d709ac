//! Leaf payloads and the slicing rules that keep sharing intact.
//!
//! Four flavors of leaf:
//!
//! - `Owned`: the leaf owns its text.
//! - `Static`: a borrowed `&'static str` (string literals enter the rope
//!   without a copy).
//! - `Repeated`: one segment observed `count` times.
//! - `Ref`: a `[lo, hi)` byte window into some `Owned` leaf, holding a
//!   refcount on it. This is the substring-without-copy primitive: slicing
//!   a shared owned leaf produces refs and leaves the owner untouched.
//!
//! Refs never chain. Taking a ref of a ref composes the offsets down to the
//! ultimate owner.

use crate::rope::RepeatedText;
use crate::text::Text;
use crate::Shared;

use super::{Node, NodeHandle};

#[derive(Debug, Clone)]
pub(crate) enum Leaf {
    Owned(Text),
    Static(&'static str),
    Repeated(RepeatedText),
    Ref(LeafRef),
}

#[derive(Debug, Clone)]
pub(crate) struct LeafRef {
    /// Always an `Owned` leaf.
    pub owner: NodeHandle,
    pub lo: usize,
    pub hi: usize,
}

impl LeafRef {
    pub(crate) fn as_str(&self) -> &str {
        match &*self.owner {
            Node::Leaf(Leaf::Owned(t)) => &t.as_str()[self.lo..self.hi],
            _ => unreachable!("ref target is not an owned leaf"),
        }
    }
}

impl Leaf {
    /// Size in bytes.
    pub(crate) fn len(&self) -> usize {
        match self {
            Leaf::Owned(t) => t.len_bytes(),
            Leaf::Static(s) => s.len(),
            Leaf::Repeated(r) => r.len_bytes(),
            Leaf::Ref(r) => r.hi - r.lo,
        }
    }

    /// The contiguous chunk covering byte `off` of this leaf, and the
    /// offset within the leaf at which that chunk starts. Only a repeated
    /// leaf has more than one chunk.
    pub(crate) fn chunk_containing(&self, off: usize) -> (&str, usize) {
        debug_assert!(off < self.len());
        match self {
            Leaf::Owned(t) => (t.as_str(), 0),
            Leaf::Static(s) => (s, 0),
            Leaf::Ref(r) => (r.as_str(), 0),
            Leaf::Repeated(r) => {
                let period = r.segment().len();
                let k = off / period;
                (r.segment(), k * period)
            }
        }
    }
}

pub(crate) fn make_node(leaf: Leaf) -> NodeHandle {
    Shared::new(Node::Leaf(leaf))
}

/// A leaf borrowing the window `[lo, hi)` of `owner`.
pub(crate) fn make_ref(owner: &NodeHandle, lo: usize, hi: usize) -> NodeHandle {
    match owner.as_leaf() {
        // Never chain refs; compose offsets down to the owning leaf.
        Leaf::Ref(r) => make_ref(&r.owner, r.lo + lo, r.lo + hi),
        Leaf::Owned(t) => {
            debug_assert!(lo < hi && hi <= t.len_bytes());
            debug_assert!(
                t.as_str().is_char_boundary(lo) && t.as_str().is_char_boundary(hi),
                "ref window off char boundaries"
            );
            make_node(Leaf::Ref(LeafRef { owner: owner.clone(), lo, hi }))
        }
        _ => unreachable!("ref target must be an owned leaf"),
    }
}

fn slice_repeated(r: &RepeatedText, lo: usize, hi: usize) -> NodeHandle {
    let period = r.segment().len();
    if lo % period == 0 && hi % period == 0 {
        make_node(Leaf::Repeated(r.with_count((hi - lo) / period)))
    } else {
        // A repetition cut mid-period can't be represented as a count;
        // materialize the bytes.
        let mut buf = String::with_capacity(hi - lo);
        let mut pos = lo;
        while pos < hi {
            let start = pos % period;
            let end = period.min(start + (hi - pos));
            buf.push_str(&r.segment()[start..end]);
            pos += end - start;
        }
        make_node(Leaf::Owned(Text::from_normalized(buf)))
    }
}

/// Slice `[lo, hi)` out of a leaf that may be shared. The original node is
/// never touched: owned text is windowed through a ref, the small view
/// variants are narrowed into fresh nodes.
pub(crate) fn slice_leaf_shared(node: &NodeHandle, lo: usize, hi: usize) -> NodeHandle {
    debug_assert!(lo < hi && hi <= node.size());
    match node.as_leaf() {
        Leaf::Owned(_) => make_ref(node, lo, hi),
        Leaf::Ref(r) => make_ref(&r.owner, r.lo + lo, r.lo + hi),
        Leaf::Static(s) => make_node(Leaf::Static(&s[lo..hi])),
        Leaf::Repeated(r) => slice_repeated(r, lo, hi),
    }
}

/// Slice `[lo, hi)` out of a leaf, narrowing in place when the node is
/// uniquely owned and the variant can represent the window. Falls back to
/// [`slice_leaf_shared`] when the node is shared - which includes the case
/// where a ref was just taken of it, so an owned buffer is never truncated
/// out from under a ref.
pub(crate) fn slice_leaf_mut(node: &mut NodeHandle, lo: usize, hi: usize) -> NodeHandle {
    debug_assert!(lo < hi && hi <= node.size());
    if Shared::strong_count(node) > 1 {
        return slice_leaf_shared(node, lo, hi);
    }

    let materialized = match node.as_leaf() {
        Leaf::Repeated(r) => {
            let period = r.segment().len();
            (lo % period != 0 || hi % period != 0).then(|| slice_repeated(r, lo, hi))
        }
        _ => None,
    };
    if let Some(m) = materialized {
        return m;
    }

    match Shared::make_mut(node).as_leaf_mut() {
        Leaf::Owned(t) => {
            t.truncate_bytes(hi);
            t.remove_prefix_bytes(lo);
        }
        Leaf::Ref(r) => {
            r.hi = r.lo + hi;
            r.lo += lo;
        }
        Leaf::Static(s) => {
            let whole: &'static str = *s;
            *s = &whole[lo..hi];
        }
        Leaf::Repeated(r) => r.set_count((hi - lo) / r.segment().len()),
    }
    node.clone()
}

/// Erase `[lo, hi)` from a leaf, producing the kept slice(s): the part
/// before the hole and (when the hole is interior) the part after it.
/// `(None, None)` means the whole leaf was erased.
pub(crate) fn erase_leaf(
    node: &mut NodeHandle,
    lo: usize,
    hi: usize,
) -> (Option<NodeHandle>, Option<NodeHandle>) {
    let leaf_size = node.size();
    debug_assert!(lo <= hi && hi <= leaf_size);

    if lo == 0 && hi == leaf_size {
        return (None, None);
    }

    // A uniquely owned text leaf can just close the hole in place.
    if Shared::strong_count(node) == 1 && matches!(node.as_leaf(), Leaf::Owned(_)) {
        {
            let Node::Leaf(Leaf::Owned(t)) = Shared::make_mut(node) else {
                unreachable!()
            };
            t.remove_bytes(lo..hi);
        }
        return (Some(node.clone()), None);
    }

    // The suffix slice is taken first and is always immutable, pinning the
    // node so the prefix slice can't narrow the buffer underneath it.
    let suffix = (hi != leaf_size).then(|| slice_leaf_shared(node, hi, leaf_size));
    let prefix = (lo != 0).then(|| slice_leaf_mut(node, 0, lo));
    match (prefix, suffix) {
        (None, s) => (s, None),
        (p, s) => (p, s),
    }
}
