//! The top-level handle over a trie (spec.md §4.5, `SPEC_FULL.md` §B.1).

use std::fmt;
use std::sync::atomic::Ordering;

use crate::children;
use crate::node::{Node, NodeData};

/// A lock-free prefix tree keyed by sequences of `u64` symbols.
///
/// `Tree` owns the root [`NodeData`] directly; every other vertex hangs off it through
/// the [`Node`] handles returned by [`Tree::root`] and [`Node::at`]. Cloning a `Tree` is
/// not supported — share it across threads behind a reference or an `Arc`.
pub struct Tree {
    root: Box<NodeData>,
}

impl Tree {
    /// Creates an empty tree: a single root node with counter `0` and no children.
    pub fn new() -> Self {
        Self {
            root: Box::new(NodeData::new()),
        }
    }

    /// Returns a handle to the root node, borrowed from this tree.
    pub fn root(&self) -> Node<'_> {
        Node::from_raw(&*self.root as *const NodeData)
    }

    /// Returns `true` if the root has never had a child installed.
    ///
    /// Relaxed-ordered: this is a convenience snapshot, not a linearization point, and
    /// carries no synchronization obligation with concurrent inserts.
    pub fn is_empty(&self) -> bool {
        self.root.children().load(Ordering::Relaxed, unsafe {
            crossbeam_epoch::unprotected()
        }).is_null()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Tree {
    /// Recursively frees every node and child array the tree ever allocated.
    ///
    /// Mirrors the teacher's `impl Drop for Raw` (`examples/leshow-contrie/src/raw/mod.rs`):
    /// `&mut self` is the destructor's proof that no concurrent access remains, so walking
    /// with `unprotected()`/`Relaxed` throughout is sound the same way it is there.
    /// spec.md's bounded-memory Non-goal excuses reclamation only "during the lifetime of
    /// the tree" — at teardown, a `Tree` cleans up after itself like any other Rust
    /// container, rather than leaking its entire backing allocation.
    fn drop(&mut self) {
        unsafe { children::drop_subtree(&mut self.root) }
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("root", &(&*self.root as *const NodeData))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tree_is_empty() {
        let tree = Tree::new();
        assert!(tree.is_empty());
    }

    #[test]
    fn inserting_a_child_makes_it_non_empty() {
        let tree = Tree::new();
        tree.root().at(1).unwrap();
        assert!(!tree.is_empty());
    }

    #[test]
    fn root_is_stable_across_calls() {
        let tree = Tree::new();
        assert_eq!(tree.root(), tree.root());
    }

    #[test]
    fn default_matches_new() {
        let tree = Tree::default();
        assert!(tree.is_empty());
    }

    #[test]
    fn drop_reclaims_a_grown_tree_without_panicking() {
        let tree = Tree::new();
        let root = tree.root();
        for i in 1..=200u64 {
            root.at(i).unwrap().set_value(i as i64);
        }
        drop(tree);
    }
}
