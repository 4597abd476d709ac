//! The persistent B-tree underneath [`Rope`](crate::Rope).
//!
//! Nodes are held through refcounted handles and never mutated while
//! shared: `Shared::make_mut` hands back the node when the refcount is 1 and
//! clones it otherwise, so every edit copies at most the O(log n) nodes on
//! the path from the root to the touched leaf. Cloning an interior node
//! bumps the refcounts of its children rather than copying subtrees, which
//! is what makes whole-tree versions cheap to keep.
//!
//! Interior nodes store children alongside a parallel vector of cumulative
//! sizes: `keys[i]` is the total byte size of `children[0..=i]`. Descent to
//! a byte offset is a linear scan of at most 16 keys per level - at this
//! width that beats binary search and the whole keys array sits in one or
//! two cache lines.
//!
//! Leaf payloads and slicing live in [`leaf`], the insert/erase machinery in
//! [`ops`].

pub(crate) mod leaf;
pub(crate) mod ops;

use smallvec::SmallVec;

use crate::Shared;
pub(crate) use leaf::Leaf;

pub(crate) const MIN_CHILDREN: usize = 8;
pub(crate) const MAX_CHILDREN: usize = 16;

pub(crate) type NodeHandle = Shared<Node>;

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Leaf(Leaf),
    Interior(Interior),
}

/// An interior node. Aligned so the keys scan stays within a cache line.
#[derive(Debug, Clone)]
#[repr(align(64))]
pub(crate) struct Interior {
    pub children: SmallVec<[NodeHandle; MAX_CHILDREN]>,
    pub keys: SmallVec<[usize; MAX_CHILDREN]>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum KeyAdjust {
    /// Subtract the erased child's size from the keys after it.
    Adjust,
    /// Leave the later keys alone; the caller rebuilds them wholesale. Used
    /// when the erased child's content was already absorbed by a sibling
    /// merge, where adjusting would subtract it twice.
    DontAdjust,
}

impl Node {
    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Total byte size of the subtree.
    pub(crate) fn size(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.len(),
            Node::Interior(int) => int.keys.last().copied().unwrap_or(0),
        }
    }

    pub(crate) fn num_children(&self) -> usize {
        self.as_interior().children.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.num_children() == MAX_CHILDREN
    }

    pub(crate) fn almost_full(&self) -> bool {
        self.num_children() == MAX_CHILDREN - 1
    }

    /// Children are homogeneous: this looks at child 0 only.
    pub(crate) fn leaf_children(&self) -> bool {
        self.as_interior().children[0].is_leaf()
    }

    pub(crate) fn as_interior(&self) -> &Interior {
        match self {
            Node::Interior(int) => int,
            Node::Leaf(_) => unreachable!("expected an interior node"),
        }
    }

    pub(crate) fn as_interior_mut(&mut self) -> &mut Interior {
        match self {
            Node::Interior(int) => int,
            Node::Leaf(_) => unreachable!("expected an interior node"),
        }
    }

    pub(crate) fn as_leaf(&self) -> &Leaf {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Interior(_) => unreachable!("expected a leaf node"),
        }
    }

    pub(crate) fn as_leaf_mut(&mut self) -> &mut Leaf {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Interior(_) => unreachable!("expected a leaf node"),
        }
    }
}

impl Interior {
    /// Byte offset at which child `i` starts.
    pub(crate) fn offset(&self, i: usize) -> usize {
        if i == 0 {
            0
        } else {
            self.keys[i - 1]
        }
    }

    /// Index of the child whose span contains byte offset `n`. On an exact
    /// boundary this picks the child *starting* at `n`, except past the last
    /// boundary where it clamps to the last child.
    pub(crate) fn find_child(&self, n: usize) -> usize {
        let mut i = 0;
        let last = self.keys.len() - 1;
        while i < last && self.keys[i] <= n {
            i += 1;
        }
        i
    }

    pub(crate) fn insert_child(&mut self, i: usize, child: NodeHandle) {
        let child_size = child.size();
        self.children.insert(i, child);
        self.keys.insert(i, self.offset(i));
        for k in &mut self.keys[i..] {
            *k += child_size;
        }
    }

    pub(crate) fn erase_child(&mut self, i: usize, adjust: KeyAdjust) {
        let child_size = self.children[i].size();
        self.children.remove(i);
        self.keys.remove(i);
        if adjust == KeyAdjust::Adjust {
            for k in &mut self.keys[i..] {
                *k -= child_size;
            }
        }
    }
}

/// Walk the whole tree and assert every structural invariant. Meant for
/// tests and fuzzers; it visits everything.
pub(crate) fn dbg_check(root: &NodeHandle) {
    let mut leaf_depth = None;
    dbg_check_walk(root, 0, true, &mut leaf_depth);
}

fn dbg_check_walk(
    node: &NodeHandle,
    depth: usize,
    is_root: bool,
    leaf_depth: &mut Option<usize>,
) -> usize {
    match &**node {
        Node::Leaf(leaf) => {
            dbg_check_leaf(leaf);
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(d) => assert_eq!(d, depth, "leaves at unequal depths"),
            }
            leaf.len()
        }
        Node::Interior(int) => {
            assert!(!int.children.is_empty());
            assert_eq!(int.children.len(), int.keys.len());
            assert!(int.children.len() <= MAX_CHILDREN);
            if is_root {
                assert!(int.children.len() >= 2, "interior root with < 2 children");
            } else {
                // Splitting an almost-full node leaves MIN_CHILDREN - 1
                // behind, so that is the true floor.
                assert!(int.children.len() >= MIN_CHILDREN - 1, "underfull interior node");
            }
            let first_is_leaf = int.children[0].is_leaf();
            let mut sum = 0;
            for (child, &key) in int.children.iter().zip(&int.keys) {
                assert_eq!(child.is_leaf(), first_is_leaf, "mixed leaf/interior children");
                sum += dbg_check_walk(child, depth + 1, false, leaf_depth);
                assert_eq!(key, sum, "key is not the prefix sum of child sizes");
            }
            sum
        }
    }
}

fn dbg_check_leaf(leaf: &Leaf) {
    assert!(leaf.len() > 0, "empty leaf in tree");
    match leaf {
        Leaf::Owned(_) | Leaf::Static(_) => {}
        Leaf::Repeated(r) => {
            assert!(r.count() >= 1);
            assert!(!r.segment().is_empty());
        }
        Leaf::Ref(r) => match &*r.owner {
            Node::Leaf(Leaf::Owned(t)) => {
                assert!(r.lo < r.hi && r.hi <= t.len_bytes(), "ref window out of bounds");
                assert!(
                    t.as_str().is_char_boundary(r.lo) && t.as_str().is_char_boundary(r.hi),
                    "ref window off char boundaries"
                );
            }
            _ => panic!("ref target is not an owned leaf"),
        },
    }
}
