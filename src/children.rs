//! Child-array representations, lookup/insertion, and lock-free growth
//! (spec.md §3 "ChildArray", §4.2 "at(symbol) algorithm", §4.3 "Child-array growth").

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use crossbeam_utils::Backoff;

use crate::error::Error;
use crate::hash;
use crate::node::NodeData;
use crate::pool;
use crate::symbol;

/// Initial and maximum capacities for the Linear representation, and the capacity a
/// Linear array switches into Hash at (spec.md §9's Open Question: "any monotone
/// schedule ... is compliant").
const LINEAR_INITIAL_CAPACITY: usize = 2;
const LINEAR_MAX_CAPACITY: usize = 16;
const HASH_INITIAL_CAPACITY: usize = 32;

/// A single (symbol, child) edge slot.
///
/// `symbol` is the sole arbitration point for ownership of the slot: a thread claims an
/// unused slot by CAS-ing `symbol` from [`symbol::EMPTY`] to its desired value, and only
/// the winner ever writes `child`. This avoids a race where two different symbols both
/// speculatively pre-write `child` before knowing which of them owns the slot. Readers
/// therefore always check `symbol` first and only then read `child` — see
/// [`Slot::acquire_child`] for the narrow window where `symbol` is visible but `child`
/// has not been published yet.
struct Slot {
    symbol: AtomicU64,
    child: Atomic<NodeData>,
}

impl Slot {
    fn empty() -> Self {
        Self {
            symbol: AtomicU64::new(symbol::EMPTY),
            child: Atomic::null(),
        }
    }

    /// Acquire-loads `child`, spinning the rare handful of cycles it can take the
    /// winner of this slot's symbol-CAS to finish publishing it.
    fn acquire_child<'g>(&self, guard: &'g Guard) -> Shared<'g, NodeData> {
        let backoff = Backoff::new();
        loop {
            let child = self.child.load(Ordering::Acquire, guard);
            if !child.is_null() {
                return child;
            }
            backoff.spin();
        }
    }
}

fn alloc_slots(capacity: usize) -> Result<Box<[Slot]>, Error> {
    let mut slots = Vec::new();
    slots
        .try_reserve_exact(capacity)
        .map_err(|_| Error::AllocationExhausted)?;
    slots.extend((0..capacity).map(|_| Slot::empty()));
    Ok(slots.into_boxed_slice())
}

struct LinearArray {
    slots: Box<[Slot]>,
}

impl LinearArray {
    fn new(capacity: usize) -> Result<Self, Error> {
        Ok(Self {
            slots: alloc_slots(capacity)?,
        })
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

struct HashArray {
    slots: Box<[Slot]>,
    mask: u64,
}

impl HashArray {
    fn new(capacity: usize) -> Result<Self, Error> {
        debug_assert!(capacity.is_power_of_two());
        Ok(Self {
            slots: alloc_slots(capacity)?,
            mask: capacity as u64 - 1,
        })
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// The three representations a node's child set can hold (spec.md §3). `Empty` has no
/// allocation of its own — it is the null state of `NodeData::children`.
pub(crate) enum ChildArray {
    Linear(LinearArray),
    Hash(HashArray),
}

impl ChildArray {
    fn slots(&self) -> &[Slot] {
        match self {
            ChildArray::Linear(l) => &l.slots,
            ChildArray::Hash(h) => &h.slots,
        }
    }

    /// Places an already-live `(symbol, child)` pair into this array without any CAS.
    /// Only ever called on an array under construction, before it has been published to
    /// any other thread, so there is no concurrent writer to race with.
    fn place_unpublished(&mut self, symbol: u64, child: Shared<'_, NodeData>) {
        match self {
            ChildArray::Linear(l) => {
                for slot in l.slots.iter() {
                    if slot.symbol.load(Ordering::Relaxed) == symbol::EMPTY {
                        slot.symbol.store(symbol, Ordering::Relaxed);
                        slot.child.store(child, Ordering::Relaxed);
                        return;
                    }
                }
                unreachable!("linear successor sized without room for a copied slot");
            }
            ChildArray::Hash(h) => {
                let mask = h.mask;
                let mut idx = (hash::mix(symbol) & mask) as usize;
                loop {
                    let slot = &h.slots[idx];
                    if slot.symbol.load(Ordering::Relaxed) == symbol::EMPTY {
                        slot.symbol.store(symbol, Ordering::Relaxed);
                        slot.child.store(child, Ordering::Relaxed);
                        return;
                    }
                    idx = (idx + 1) & mask as usize;
                }
            }
        }
    }
}

enum NextRepresentation {
    Linear(usize),
    Hash(usize),
}

fn next_representation(old: &ChildArray) -> NextRepresentation {
    match old {
        ChildArray::Linear(l) if l.capacity() < LINEAR_MAX_CAPACITY => {
            NextRepresentation::Linear(l.capacity() * 2)
        }
        ChildArray::Linear(_) => NextRepresentation::Hash(HASH_INITIAL_CAPACITY),
        ChildArray::Hash(h) => NextRepresentation::Hash(h.capacity() * 2),
    }
}

/// The load-factor bound past which a Hash array must grow rather than keep probing
/// (spec.md §4.2 Hash case, §9: "2/3 full, or a probe distance cap" — this uses the
/// latter, pinned to the same 2/3 fraction).
fn probe_distance_bound(capacity: usize) -> usize {
    capacity * 2 / 3
}

/// Freeze-then-publish growth of `parent`'s child array (spec.md §4.3).
///
/// Copies every live `(symbol, child)` pair from the array at `old` into a freshly
/// allocated, strictly larger successor, freezing each old slot immediately after its
/// pair has been copied, then attempts to publish the successor as `parent`'s new
/// `children` pointer. If another thread is concurrently growing the same array (visible
/// as an already-frozen slot we didn't freeze ourselves), this abandons its own successor
/// early rather than finish building a duplicate — the caller's retry loop picks up
/// whichever array ends up published.
fn grow(parent: &NodeData, old: Shared<'_, ChildArray>, guard: &Guard) -> Result<(), Error> {
    let old_ref = unsafe { old.as_ref() }.expect("grow called on an Empty child array");
    let mut successor = match next_representation(old_ref) {
        NextRepresentation::Linear(capacity) => ChildArray::Linear(LinearArray::new(capacity)?),
        NextRepresentation::Hash(capacity) => ChildArray::Hash(HashArray::new(capacity)?),
    };

    for slot in old_ref.slots() {
        loop {
            let current_symbol = slot.symbol.load(Ordering::Acquire);
            if current_symbol == symbol::FROZEN {
                // Someone else is already growing this exact array (or already has).
                // Whatever we've built so far is redundant; let it drop and have the
                // caller retry against whichever array ends up published.
                log::trace!("abandoning a concurrent child-array growth attempt");
                return Ok(());
            }
            if current_symbol == symbol::EMPTY {
                match slot.symbol.compare_exchange(
                    symbol::EMPTY,
                    symbol::FROZEN,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => break,
                    Err(_) => continue,
                }
            }
            let child = slot.acquire_child(guard);
            successor.place_unpublished(current_symbol, child);
            match slot.symbol.compare_exchange(
                current_symbol,
                symbol::FROZEN,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(_) => continue,
            }
        }
    }

    let owned = Owned::new(successor);
    match parent
        .children()
        .compare_and_set(old, owned, (Ordering::Release, Ordering::Relaxed), guard)
    {
        Ok(_) => {
            log::trace!("child array grown");
            Ok(())
        }
        Err(e) => {
            // Lost the publish race; the winner's array preserves the same mapping, so
            // our copy is simply redundant work.
            drop(e.new);
            Ok(())
        }
    }
}

/// Outcome of one pass over a populated (Linear or Hash) child array.
enum ScanOutcome {
    Found(*const NodeData),
    /// The array is full (or, for Hash, past its probe-distance bound) — must grow.
    NeedsGrowth,
    /// A slot we needed was frozen or claimed-then-lost; reload `children` and retry.
    Retry,
}

/// Speculatively allocates a child node, attempts to claim `slot` for `symbol`, and
/// recycles the allocation through the pool if the claim is lost.
fn claim_slot<'g>(
    slot: &Slot,
    symbol: u64,
    guard: &'g Guard,
) -> Result<Option<*const NodeData>, Error> {
    let boxed_child = pool::alloc()?;
    let raw_child: *mut NodeData = Box::into_raw(boxed_child);
    let child_shared: Shared<'g, NodeData> = unsafe { Shared::from(raw_child as *const NodeData) };
    match slot
        .symbol
        .compare_exchange(symbol::EMPTY, symbol, Ordering::AcqRel, Ordering::Acquire)
    {
        Ok(_) => {
            slot.child.store(child_shared, Ordering::Release);
            Ok(Some(raw_child as *const NodeData))
        }
        Err(_) => {
            // Didn't win the slot; the speculative allocation was never published to
            // anyone, so it's safe to reclaim straight back into this thread's pool.
            let reclaimed = unsafe { Box::from_raw(raw_child) };
            pool::recycle(reclaimed);
            let now = slot.symbol.load(Ordering::Acquire);
            if now == symbol {
                // Another inserter won with the exact symbol we wanted.
                Ok(Some(slot.acquire_child(guard).as_raw()))
            } else {
                // Either frozen (growth in progress) or claimed by a different symbol;
                // let the caller decide what that means for its scan/probe.
                Ok(None)
            }
        }
    }
}

fn scan_linear(linear: &LinearArray, symbol: u64, guard: &Guard) -> Result<ScanOutcome, Error> {
    for slot in linear.slots.iter() {
        let current = slot.symbol.load(Ordering::Acquire);
        if current == symbol {
            return Ok(ScanOutcome::Found(slot.acquire_child(guard).as_raw()));
        }
        if current == symbol::FROZEN {
            return Ok(ScanOutcome::Retry);
        }
        if current == symbol::EMPTY {
            return match claim_slot(slot, symbol, guard)? {
                Some(ptr) => Ok(ScanOutcome::Found(ptr)),
                None => {
                    let now = slot.symbol.load(Ordering::Acquire);
                    if now == symbol::FROZEN {
                        Ok(ScanOutcome::Retry)
                    } else {
                        // Claimed by a different symbol meanwhile; keep scanning forward
                        // from the next slot rather than restarting the whole array.
                        continue;
                    }
                }
            };
        }
        // Occupied by a different symbol; keep scanning.
    }
    Ok(ScanOutcome::NeedsGrowth)
}

fn probe_hash(hash_array: &HashArray, symbol: u64, guard: &Guard) -> Result<ScanOutcome, Error> {
    let capacity = hash_array.capacity();
    let bound = probe_distance_bound(capacity);
    let start = (hash::mix(symbol) & hash_array.mask) as usize;

    for step in 0..capacity {
        let idx = (start + step) & hash_array.mask as usize;
        let slot = &hash_array.slots[idx];
        let current = slot.symbol.load(Ordering::Acquire);
        if current == symbol {
            return Ok(ScanOutcome::Found(slot.acquire_child(guard).as_raw()));
        }
        if current == symbol::FROZEN {
            return Ok(ScanOutcome::Retry);
        }
        if current == symbol::EMPTY {
            if step >= bound {
                return Ok(ScanOutcome::NeedsGrowth);
            }
            return match claim_slot(slot, symbol, guard)? {
                Some(ptr) => Ok(ScanOutcome::Found(ptr)),
                // "otherwise re-probe same slot" (spec.md §4.2): re-read what actually
                // ended up there rather than treating our own lost CAS as fatal.
                None => {
                    let now = slot.symbol.load(Ordering::Acquire);
                    if now == symbol::FROZEN {
                        Ok(ScanOutcome::Retry)
                    } else {
                        continue;
                    }
                }
            };
        }
    }
    Ok(ScanOutcome::NeedsGrowth)
}

/// Installs a brand new Linear(2) array, pre-populated with one `(symbol, child)` slot,
/// as `parent`'s child array (the Empty case of spec.md §4.2).
fn create_initial(
    parent: &NodeData,
    symbol: u64,
    guard: &Guard,
) -> Result<Option<*const NodeData>, Error> {
    let linear = LinearArray::new(LINEAR_INITIAL_CAPACITY)?;
    let boxed_child = pool::alloc()?;
    let raw_child: *mut NodeData = Box::into_raw(boxed_child);
    let child_shared: Shared<'_, NodeData> = unsafe { Shared::from(raw_child as *const NodeData) };
    linear.slots[0].symbol.store(symbol, Ordering::Relaxed);
    linear.slots[0].child.store(child_shared, Ordering::Relaxed);

    let owned = Owned::new(ChildArray::Linear(linear));
    match parent.children().compare_and_set(
        Shared::null(),
        owned,
        (Ordering::Release, Ordering::Relaxed),
        guard,
    ) {
        Ok(_) => Ok(Some(raw_child as *const NodeData)),
        Err(e) => {
            // The array itself never got shared, so dropping it is plain deallocation;
            // the child it held is reclaimed separately since `Atomic` doesn't cascade
            // drop (see DESIGN.md).
            drop(e.new);
            let reclaimed = unsafe { Box::from_raw(raw_child) };
            pool::recycle(reclaimed);
            Ok(None)
        }
    }
}

/// Get-or-create the child of `parent` reachable under `symbol` (spec.md §4.2).
pub(crate) fn at(parent: &NodeData, raw_symbol: u64) -> Result<*const NodeData, Error> {
    let target = symbol::validate(raw_symbol)?;
    let guard = epoch::pin();
    let backoff = Backoff::new();

    loop {
        let current = parent.children().load(Ordering::Acquire, &guard);
        if current.is_null() {
            match create_initial(parent, target, &guard)? {
                Some(ptr) => return Ok(ptr),
                None => {
                    backoff.spin();
                    continue;
                }
            }
        }

        let array = unsafe { current.as_ref() }.expect("non-null Shared must dereference");
        let outcome = match array {
            ChildArray::Linear(linear) => scan_linear(linear, target, &guard)?,
            ChildArray::Hash(hash_array) => probe_hash(hash_array, target, &guard)?,
        };

        match outcome {
            ScanOutcome::Found(ptr) => return Ok(ptr),
            ScanOutcome::NeedsGrowth => {
                grow(parent, current, &guard)?;
                backoff.spin();
            }
            ScanOutcome::Retry => {
                backoff.spin();
            }
        }
    }
}

/// Recursively frees every child array and child node reachable from `node`.
///
/// Only ever called from `Tree`'s `Drop` impl. `&mut NodeData` is the caller's proof that
/// no concurrent access remains by this point — the same precondition the teacher's
/// `impl Drop for Raw` relies on for its own `drop_recursive` (`unprotected()`/`Relaxed`
/// throughout, since whatever built this subtree has already happened-before us). Only
/// the currently-published array of each node is walked; arrays abandoned mid-growth (a
/// losing `grow()`'s successor, or an old array superseded by one) were already freed, or
/// were never published, at the point they were abandoned — see `grow`/`create_initial`.
pub(crate) unsafe fn drop_subtree(node: &mut NodeData) {
    let guard = epoch::unprotected();
    let current = node.children().load(Ordering::Relaxed, guard);
    if current.is_null() {
        return;
    }
    let owned = current.into_owned();
    for slot in owned.slots() {
        let sym = slot.symbol.load(Ordering::Relaxed);
        if sym == symbol::EMPTY || sym == symbol::FROZEN {
            continue;
        }
        let child = slot.child.load(Ordering::Relaxed, guard);
        if child.is_null() {
            continue;
        }
        let mut boxed_child = Box::from_raw(child.as_raw() as *mut NodeData);
        drop_subtree(&mut boxed_child);
        // `boxed_child` is freed here; its own `children` is already null-equivalent
        // (everything reachable through it was just walked and freed above).
    }
    // `owned` (the slots array itself) is freed here.
}
