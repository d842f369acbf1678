//! Per-thread object pool for [`NodeData`] allocations (spec.md §5 "Allocator").
//!
//! `Node::at` speculatively allocates a child before attempting the CAS that installs it,
//! and discards the allocation on failure (spec.md §4.2, §9 "Speculative allocation").
//! Since that happens on every contended insertion, routing the discard through a
//! per-thread free list avoids bouncing every lost race through the global allocator
//! (see `DESIGN.md` for the tradeoff against simply dropping the allocation).

use std::cell::RefCell;

use crate::error::Error;
use crate::node::NodeData;

thread_local! {
    static FREE: RefCell<Vec<Box<NodeData>>> = RefCell::new(Vec::new());
}

/// Hands out a freshly-zeroed (value `0`, no children) node, reusing a discarded
/// speculative allocation from this thread's free list when one is available.
pub(crate) fn alloc() -> Result<Box<NodeData>, Error> {
    if let Some(reused) = FREE.with(|free| free.borrow_mut().pop()) {
        return Ok(reused);
    }
    // Probe for headroom before committing to the real allocation, so a genuinely
    // exhausted allocator surfaces as `Error::AllocationExhausted` rather than aborting
    // the process.
    let mut probe: Vec<NodeData> = Vec::new();
    probe
        .try_reserve_exact(1)
        .map_err(|_| Error::AllocationExhausted)?;
    Ok(Box::new(NodeData::new()))
}

/// Returns a speculative allocation that lost its publish race to the free list for
/// reuse. Only ever called with a node that was never shared with another thread, so it
/// is still in its pristine just-constructed state.
pub(crate) fn recycle(node: Box<NodeData>) {
    FREE.with(|free| free.borrow_mut().push(node));
}
