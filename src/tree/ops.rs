//! Insert and erase, both as single top-down passes (CLRS style).
//!
//! Insertion splits full nodes pre-emptively on the way down so the
//! recursion always enters a node with room. Leaf-level insertion can add
//! *two* children to a parent (the split of the leaf under the cut point
//! plus the new leaf), which is why parents of leaves are split already at
//! MAX_CHILDREN - 1.
//!
//! Erasure pulls children down on the way in - rotate one over from a rich
//! sibling, or merge with a poor one - so that every node it recurses into
//! can afford to lose a child without any upward rebalancing afterwards.

use smallvec::{smallvec, SmallVec};

use crate::Shared;

use super::leaf::{erase_leaf, slice_leaf_mut, slice_leaf_shared};
use super::{Interior, KeyAdjust, Node, NodeHandle, MAX_CHILDREN, MIN_CHILDREN};

/// Descend to the leaf containing byte offset `at`, returning the leaf's
/// handle and the residual offset within it. An `at` on a leaf boundary
/// resolves to the leaf *starting* there (unless `at` is the total size).
pub(crate) fn find_leaf(root: &NodeHandle, mut at: usize) -> (&NodeHandle, usize) {
    debug_assert!(at <= root.size());
    let mut node = root;
    while let Node::Interior(int) = &**node {
        let i = int.find_child(at);
        at -= int.offset(i);
        node = &int.children[i];
    }
    (node, at)
}

/// The contiguous chunk covering byte `at` and the global offset at which
/// that chunk starts. `at` may equal the total size; that resolves to the
/// last chunk.
pub(crate) fn chunk_at(root: &NodeHandle, at: usize) -> (&str, usize) {
    let total = root.size();
    debug_assert!(0 < total && at <= total);
    let mut at = if at == total { total - 1 } else { at };
    let mut node = root;
    let mut base = 0;
    while let Node::Interior(int) = &**node {
        let i = int.find_child(at);
        let off = int.offset(i);
        base += off;
        at -= off;
        node = &int.children[i];
    }
    let (chunk, start) = node.as_leaf().chunk_containing(at);
    (chunk, base + start)
}

fn wrap_root(root: NodeHandle) -> NodeHandle {
    let size = root.size();
    Shared::new(Node::Interior(Interior {
        children: smallvec![root],
        keys: smallvec![size],
    }))
}

/// Insert a leaf node at byte offset `at`, returning the new root.
pub(crate) fn insert(root: Option<NodeHandle>, at: usize, node: NodeHandle) -> NodeHandle {
    debug_assert!(node.is_leaf());
    let Some(mut root) = root else {
        debug_assert_eq!(at, 0);
        return node;
    };
    debug_assert!(at <= root.size());

    if root.is_leaf() {
        let mut new_root = wrap_root(root);
        insert_nonfull(&mut new_root, at, node);
        new_root
    } else if root.is_full() || (root.leaf_children() && root.almost_full()) {
        let mut new_root = wrap_root(root);
        split_child(&mut new_root, 0);
        insert_nonfull(&mut new_root, at, node);
        new_root
    } else {
        insert_nonfull(&mut root, at, node);
        root
    }
}

fn insert_nonfull(parent: &mut NodeHandle, at: usize, node: NodeHandle) {
    debug_assert!(!parent.is_leaf());
    debug_assert!(!parent.is_full());
    debug_assert!(at <= parent.size());

    let mut i = parent.as_interior().find_child(at);
    if parent.leaf_children() {
        // May add a child to parent; together with the insert below that is
        // two, which is what the almost_full pre-split is for.
        split_leaf(parent, i, at);
        if parent.as_interior().keys[i] <= at {
            i += 1;
        }
        let p = Shared::make_mut(parent).as_interior_mut();
        p.insert_child(i, node);
    } else {
        let needs_split = {
            let child = &parent.as_interior().children[i];
            child.is_full() || (child.leaf_children() && child.almost_full())
        };
        if needs_split {
            split_child(parent, i);
            if parent.as_interior().keys[i] <= at {
                i += 1;
            }
        }
        let p = Shared::make_mut(parent).as_interior_mut();
        let off = p.offset(i);
        let old_size = p.children[i].size();
        insert_nonfull(&mut p.children[i], at - off, node);
        let grown = p.children[i].size() - old_size;
        for k in &mut p.keys[i..] {
            *k += grown;
        }
    }
}

/// Split the full (or almost full) interior child at index `i`, moving its
/// tail children into a fresh right sibling at `i + 1`.
fn split_child(parent: &mut NodeHandle, i: usize) {
    debug_assert!(!parent.is_full());

    let p = Shared::make_mut(parent).as_interior_mut();
    let off = p.offset(i);
    debug_assert!({
        let c = &p.children[i];
        c.is_full() || c.almost_full()
    });

    let (sibling, left_size) = {
        let child = Shared::make_mut(&mut p.children[i]).as_interior_mut();
        // An almost-full child yields a MIN_CHILDREN - 1 sibling.
        let moved: SmallVec<[NodeHandle; MAX_CHILDREN]> =
            child.children.drain(MIN_CHILDREN..).collect();
        child.keys.truncate(MIN_CHILDREN);
        let left_size = *child.keys.last().unwrap();

        let mut keys: SmallVec<[usize; MAX_CHILDREN]> = SmallVec::new();
        let mut sum = 0;
        for c in &moved {
            sum += c.size();
            keys.push(sum);
        }
        (
            Shared::new(Node::Interior(Interior { children: moved, keys })),
            left_size,
        )
    };

    p.children.insert(i + 1, sibling);
    p.keys.insert(i, off + left_size);
}

/// Split the leaf at child index `i` of `parent` at byte offset `at`
/// (global), if `at` falls strictly inside it. The right piece is always a
/// fresh immutable slice; the left piece reuses the leaf when it is the
/// only holder.
fn split_leaf(parent: &mut NodeHandle, i: usize, at: usize) {
    debug_assert!(!parent.is_full());

    let (off, child_size) = {
        let p = parent.as_interior();
        (p.offset(i), p.children[i].size())
    };
    let cut = at - off;
    if cut == 0 || cut == child_size {
        return;
    }

    let p = Shared::make_mut(parent).as_interior_mut();
    let right = slice_leaf_shared(&p.children[i], cut, child_size);
    let left = slice_leaf_mut(&mut p.children[i], 0, cut);
    p.children[i] = left;
    p.children.insert(i + 1, right);
    p.keys.insert(i, off + cut);
}

/// Erase byte range `[lo, hi)`, returning the new root (None when the tree
/// empties).
///
/// Two phases: first, if either bound lands strictly inside a leaf, the
/// kept part of that leaf is re-inserted next to it - the prefix before the
/// lo-leaf, the suffix after the hi-leaf - which reduces the problem to
/// erasing whole leaves. Then leaves at `lo` are removed one per pass until
/// the size has dropped by exactly `hi - lo`.
pub(crate) fn erase(root: Option<NodeHandle>, lo: usize, hi: usize) -> Option<NodeHandle> {
    let Some(mut root) = root else {
        debug_assert!(lo == 0 && hi == 0);
        return None;
    };
    debug_assert!(lo <= hi && hi <= root.size());

    if lo == hi {
        return Some(root);
    }
    if lo == 0 && hi == root.size() {
        return None;
    }

    if root.is_leaf() {
        return match erase_leaf(&mut root, lo, hi) {
            (Some(a), Some(b)) => {
                let a_size = a.size();
                let keys = smallvec![a_size, a_size + b.size()];
                Some(Shared::new(Node::Interior(Interior {
                    children: smallvec![a, b],
                    keys,
                })))
            }
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
    }

    let final_size = root.size() - (hi - lo);

    // If hi falls inside a leaf, plant that leaf's kept suffix right after
    // it. The whole leaf then falls inside the erased span.
    let splice = {
        let (leaf, off) = find_leaf(&root, hi);
        let leaf_size = leaf.size();
        if off != 0 && off != leaf_size {
            Some((slice_leaf_shared(leaf, off, leaf_size), hi - off + leaf_size))
        } else {
            None
        }
    };
    if let Some((suffix, suffix_at)) = splice {
        root = insert(Some(root), suffix_at, suffix);
    }

    // Symmetrically, plant the lo-leaf's kept prefix right before it.
    let splice = {
        let (leaf, off) = find_leaf(&root, lo);
        if off != 0 {
            Some((slice_leaf_shared(leaf, 0, off), lo - off))
        } else {
            None
        }
    };
    if let Some((prefix, prefix_at)) = splice {
        root = insert(Some(root), prefix_at, prefix);
    }

    // Both bounds now sit on leaf boundaries: peel whole leaves off at lo.
    while !root.is_leaf() && root.size() > final_size {
        erase_step(&mut root, lo);
    }
    debug_assert_eq!(root.size(), final_size);
    Some(root)
}

/// Remove the whole leaf starting at byte offset `at`. One top-down pass;
/// see the module comment for the pull-down discipline.
fn erase_step(node: &mut NodeHandle, at: usize) {
    if let Some(keep) = erase_step_inner(node, at) {
        *node = keep;
    }
}

/// Returns `Some(child)` when the node collapsed into that single child,
/// which only happens at the root.
fn erase_step_inner(node: &mut NodeHandle, at: usize) -> Option<NodeHandle> {
    debug_assert!(!node.is_leaf());
    let child_index = node.as_interior().find_child(at);

    if node.leaf_children() {
        // The target leaf starts exactly at `at`.
        debug_assert_eq!(node.as_interior().offset(child_index), at);
        if node.as_interior().children.len() == 2 {
            return Some(node.as_interior().children[1 - child_index].clone());
        }
        let p = Shared::make_mut(node).as_interior_mut();
        p.erase_child(child_index, KeyAdjust::Adjust);
        return None;
    }

    let p = Shared::make_mut(node).as_interior_mut();

    // Top up children[child_index] before recursing into it, so the
    // recursion can always drop a child locally. The floor really is
    // MIN_CHILDREN - 1 (almost-full splits leave 7 behind), hence <= and
    // not ==.
    let child_count = p.children[child_index].num_children();
    if child_count <= MIN_CHILDREN {
        let can_rotate_left =
            child_index != 0 && p.children[child_index - 1].num_children() > MIN_CHILDREN;
        let can_rotate_right = child_index != p.children.len() - 1
            && p.children[child_index + 1].num_children() > MIN_CHILDREN;

        if can_rotate_left {
            // Move the left sibling's last child onto the front of ours.
            let moved = {
                let left = Shared::make_mut(&mut p.children[child_index - 1]).as_interior_mut();
                let last = left.children.len() - 1;
                let m = left.children[last].clone();
                left.erase_child(last, KeyAdjust::Adjust);
                m
            };
            let moved_size = moved.size();
            {
                let child = Shared::make_mut(&mut p.children[child_index]).as_interior_mut();
                child.insert_child(0, moved);
            }
            // p.keys is stale for the two shuffled children; the stale
            // offset and the shift inside the child cancel against
            // moved_size. Everything is rebuilt below.
            let off = p.offset(child_index);
            erase_step(&mut p.children[child_index], at - off + moved_size);
        } else if can_rotate_right {
            // Move the right sibling's first child onto the back of ours.
            let moved = {
                let right = Shared::make_mut(&mut p.children[child_index + 1]).as_interior_mut();
                let m = right.children[0].clone();
                right.erase_child(0, KeyAdjust::Adjust);
                m
            };
            {
                let child = Shared::make_mut(&mut p.children[child_index]).as_interior_mut();
                let end = child.children.len();
                child.insert_child(end, moved);
            }
            let off = p.offset(child_index);
            erase_step(&mut p.children[child_index], at - off);
        } else {
            // Both siblings are at the minimum too: merge with one.
            let right_index = if child_index == 0 { 1 } else { child_index };
            let left_index = right_index - 1;
            {
                let right = p.children[right_index].clone();
                let left = Shared::make_mut(&mut p.children[left_index]).as_interior_mut();
                let old_left_size = *left.keys.last().unwrap();
                let ri = right.as_interior();
                for (c, &k) in ri.children.iter().zip(&ri.keys) {
                    left.children.push(c.clone());
                    left.keys.push(old_left_size + k);
                }
            }
            let off = p.offset(left_index);
            erase_step(&mut p.children[left_index], at - off);

            if p.children.len() == 2 {
                // Only possible at the root; it collapses into the merged
                // child.
                return Some(p.children[left_index].clone());
            }
            // The right child's content lives in the merged left now;
            // adjusting keys for it would subtract its size twice.
            p.erase_child(right_index, KeyAdjust::DontAdjust);
        }
    } else {
        let off = p.offset(child_index);
        erase_step(&mut p.children[child_index], at - off);
    }

    // The shuffles above leave keys stale wholesale; rebuild the prefix
    // sums from the children.
    let mut sum = 0;
    for j in 0..p.children.len() {
        sum += p.children[j].size();
        p.keys[j] = sum;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::super::leaf::{make_node, make_ref};
    use super::super::{dbg_check, Leaf};
    use super::*;
    use crate::text::Text;

    fn owned(s: &str) -> NodeHandle {
        make_node(Leaf::Owned(Text::from(s)))
    }

    fn build(pieces: &[&str]) -> NodeHandle {
        let mut root = None;
        let mut at = 0;
        for p in pieces {
            root = Some(insert(root, at, owned(p)));
            at += p.len();
        }
        root.unwrap()
    }

    fn contents(root: &NodeHandle) -> String {
        let total = root.size();
        let mut s = String::new();
        let mut pos = 0;
        while pos < total {
            let (chunk, start) = chunk_at(root, pos);
            s.push_str(&chunk[pos - start..]);
            pos = start + chunk.len();
        }
        s
    }

    #[test]
    fn insert_grows_and_splits() {
        let pieces: Vec<String> = (0..100).map(|i| format!("p{i}.")).collect();
        let mut root = None;
        let mut at = 0;
        let mut expected = String::new();
        for p in &pieces {
            root = Some(insert(root, at, owned(p)));
            at += p.len();
            expected.push_str(p);
        }
        let root = root.unwrap();
        dbg_check(&root);
        assert_eq!(contents(&root), expected);
        assert_eq!(root.size(), expected.len());
    }

    #[test]
    fn find_leaf_hits_boundaries() {
        let root = build(&["abc", "def", "ghi"]);
        let (leaf, off) = find_leaf(&root, 0);
        assert_eq!((leaf.size(), off), (3, 0));
        // A boundary offset resolves to the leaf starting there.
        let (leaf, off) = find_leaf(&root, 3);
        assert_eq!((leaf.size(), off), (3, 0));
        let (_, off) = find_leaf(&root, 4);
        assert_eq!(off, 1);
        // The total size resolves into the last leaf.
        let (_, off) = find_leaf(&root, 9);
        assert_eq!(off, 3);
    }

    #[test]
    fn erase_everything_returns_none() {
        let root = build(&["abc", "def"]);
        assert!(erase(Some(root), 0, 6).is_none());
    }

    #[test]
    fn erase_noop_keeps_root() {
        let root = build(&["abc"]);
        let kept = erase(Some(root), 1, 1).unwrap();
        assert_eq!(contents(&kept), "abc");
    }

    #[test]
    fn erase_middle_of_single_leaf_root() {
        // Carving the middle out of a lone leaf leaves a two-child root,
        // which only the root is allowed to be.
        let root = build(&["abcdef"]);
        let root = erase(Some(root), 2, 4).unwrap();
        dbg_check(&root);
        assert_eq!(contents(&root), "abef");
    }

    #[test]
    fn erase_across_many_leaves() {
        let pieces: Vec<String> = (0..60).map(|i| format!("{:02}", i)).collect();
        let refs: Vec<&str> = pieces.iter().map(|s| s.as_str()).collect();
        let root = build(&refs);
        let total = root.size();
        let root = erase(Some(root), 3, total - 3).unwrap();
        dbg_check(&root);
        // Kept: "00" plus the first byte of "01", the last byte of "58"
        // plus "59".
        assert_eq!(contents(&root), "000859");
    }

    #[test]
    fn refs_flatten_to_the_owner() {
        let base = owned("abcdefgh");
        let r1 = make_ref(&base, 2, 8);
        let r2 = make_ref(&r1, 1, 4);
        // r2 windows the *owner* directly, offsets composed.
        match r2.as_leaf() {
            Leaf::Ref(r) => {
                assert!(Shared::ptr_eq(&r.owner, &base));
                assert_eq!((r.lo, r.hi), (3, 6));
                assert_eq!(r.as_str(), "def");
            }
            _ => panic!("expected a ref leaf"),
        }
    }
}
