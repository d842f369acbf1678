//! The `Node` handle and a node's directly-owned state (spec.md §3 "Node", §4.2, §6).

use std::fmt;
use std::marker::PhantomData;

use crossbeam_epoch::Atomic;

use crate::cell::ValueCell;
use crate::children::{self, ChildArray};
use crate::error::Error;

/// The heap-allocated state a node actually owns: its counter and its child
/// representation. Never moved once installed, and — per spec.md's Non-goals — never
/// freed for the lifetime of the tree.
pub(crate) struct NodeData {
    value: ValueCell,
    children: Atomic<ChildArray>,
}

impl NodeData {
    pub(crate) fn new() -> Self {
        Self {
            value: ValueCell::new(0),
            children: Atomic::null(),
        }
    }

    pub(crate) fn value(&self) -> &ValueCell {
        &self.value
    }

    pub(crate) fn children(&self) -> &Atomic<ChildArray> {
        &self.children
    }
}

/// A handle to one vertex of the trie, borrowed from the [`crate::Tree`] it came from.
///
/// `Node` is a thin, `Copy` reference to heap state that lives forever once created — per
/// spec.md §5, a handle obtained from `root().at(a).at(b)...` stays valid and may be
/// retained and shared across any number of threads for as long as the owning `Tree`
/// does. The `'tree` lifetime ties a `Node` to its `Tree` the same way a slice returned
/// from a growable container borrows the container: nodes are never individually freed
/// (spec.md's bounded-memory Non-goal), but the backing allocation goes away when the
/// `Tree` itself is dropped, so the borrow checker — not a runtime check — is what rules
/// out a dangling `Node`. Two handles compare equal exactly when they name the same
/// vertex (spec.md §8 property 2, node identity stability).
#[derive(Clone, Copy)]
pub struct Node<'tree> {
    ptr: *const NodeData,
    _tree: PhantomData<&'tree NodeData>,
}

// Sound because `NodeData` is never moved once published, every access through it goes
// through the atomics on `ValueCell`/`Atomic<ChildArray>`, and `'tree` prevents the
// pointer from outliving the allocation it names.
unsafe impl<'tree> Send for Node<'tree> {}
unsafe impl<'tree> Sync for Node<'tree> {}

impl<'tree> Node<'tree> {
    pub(crate) fn from_raw(ptr: *const NodeData) -> Self {
        debug_assert!(!ptr.is_null());
        Self {
            ptr,
            _tree: PhantomData,
        }
    }

    fn data(&self) -> &NodeData {
        // Safe: see the `unsafe impl Send/Sync` justification above.
        unsafe { &*self.ptr }
    }

    /// Returns the current counter. Acquire-ordered; linearizes at the atomic load.
    pub fn value(&self) -> i64 {
        self.data().value().get()
    }

    /// Synonym of [`Node::value`].
    pub fn get(&self) -> i64 {
        self.value()
    }

    /// Overwrites the counter. Release-ordered; linearizes at the atomic store. May move
    /// the counter arbitrarily — no invariant ties it to `incValue`'s monotonicity.
    pub fn set_value(&self, value: i64) {
        self.data().value().set(value);
    }

    /// Atomically adds one to the counter, discarding the result.
    pub fn inc_value(&self) {
        self.data().value().increment();
    }

    /// Atomically adds one to the counter, returning the value after the increment.
    pub fn increment_and_get(&self) -> i64 {
        self.data().value().increment()
    }

    /// Returns the unique child of this node reachable under `symbol`, creating it with
    /// an initial counter of `0` if it doesn't exist yet.
    ///
    /// `symbol` must be a positive value other than the reserved frozen sentinel
    /// ([`u64::MAX`]); anything else fails with [`Error::InvalidSymbol`] and leaves the
    /// tree unmodified.
    pub fn at(&self, symbol: u64) -> Result<Node<'tree>, Error> {
        children::at(self.data(), symbol).map(Node::from_raw)
    }
}

impl<'tree> PartialEq for Node<'tree> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.ptr, other.ptr)
    }
}

impl<'tree> Eq for Node<'tree> {}

impl<'tree> fmt::Debug for Node<'tree> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never dump `value`/`children` here: under concurrent mutation a `Debug` print
        // is not a linearization point, and printing it would suggest otherwise.
        f.debug_struct("Node").field("at", &self.ptr).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaked() -> Node<'static> {
        Node::from_raw(Box::leak(Box::new(NodeData::new())))
    }

    #[test]
    fn value_roundtrips() {
        let node = leaked();
        assert_eq!(node.value(), 0);
        node.set_value(42);
        assert_eq!(node.value(), 42);
        assert_eq!(node.get(), 42);
    }

    #[test]
    fn increment_and_get_returns_new_value() {
        let node = leaked();
        assert_eq!(node.increment_and_get(), 1);
        assert_eq!(node.increment_and_get(), 2);
        node.inc_value();
        assert_eq!(node.get(), 3);
    }

    #[test]
    fn equality_is_identity() {
        let a = leaked();
        let b = Node::from_raw(a.ptr);
        let c = leaked();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn at_rejects_reserved_symbols() {
        let node = leaked();
        assert_eq!(node.at(0), Err(Error::InvalidSymbol { symbol: 0 }));
        assert_eq!(
            node.at(u64::MAX),
            Err(Error::InvalidSymbol { symbol: u64::MAX })
        );
    }

    #[test]
    fn at_creates_child_with_zero_value() {
        let node = leaked();
        let child = node.at(7).unwrap();
        assert_eq!(child.value(), 0);
    }

    #[test]
    fn at_is_idempotent_for_the_same_symbol() {
        let node = leaked();
        let first = node.at(7).unwrap();
        first.set_value(99);
        let second = node.at(7).unwrap();
        assert_eq!(second, first);
        assert_eq!(second.value(), 99);
    }
}
