//! The atomic cell backing a node's counter (spec.md §4.1, §4.2 "Value operations").
//!
//! This is the one piece of the crate narrow enough for `loom` to exhaustively check, so
//! it swaps in `loom`'s atomics under `#[cfg(loom)]` the same way the pack's `lf-queue`
//! crate gates its whole atomic core on `cfg(loom)`.

#[cfg(not(loom))]
use std::sync::atomic::{AtomicI64, Ordering};

#[cfg(loom)]
use loom::sync::atomic::{AtomicI64, Ordering};

/// A single atomically-updatable 64-bit signed counter.
///
/// `setValue` may move the counter arbitrarily; only `incValue`/`incrementAndGet` are
/// monotone. Nothing here depends on the child-array state of the node it's embedded in.
#[derive(Debug, Default)]
pub(crate) struct ValueCell(AtomicI64);

impl ValueCell {
    pub(crate) fn new(initial: i64) -> Self {
        Self(AtomicI64::new(initial))
    }

    /// Acquire-ordered read. Linearization point for `value()`/`get()`.
    pub(crate) fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Release-ordered overwrite. Linearization point for `setValue()`.
    pub(crate) fn set(&self, value: i64) {
        self.0.store(value, Ordering::Release);
    }

    /// Atomic add-one, returning the value after the increment. Linearization point for
    /// `incValue()`/`incrementAndGet()`.
    pub(crate) fn increment(&self) -> i64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial_value() {
        let cell = ValueCell::new(7);
        assert_eq!(cell.get(), 7);
    }

    #[test]
    fn set_overwrites_arbitrarily() {
        let cell = ValueCell::new(0);
        cell.set(42);
        assert_eq!(cell.get(), 42);
        cell.set(-5);
        assert_eq!(cell.get(), -5);
    }

    #[test]
    fn increment_is_monotone() {
        let cell = ValueCell::new(0);
        assert_eq!(cell.increment(), 1);
        assert_eq!(cell.increment(), 2);
        assert_eq!(cell.increment(), 3);
        assert_eq!(cell.get(), 3);
    }

    #[cfg(not(loom))]
    #[test]
    fn concurrent_increments_are_conserved() {
        use std::sync::Arc;
        use std::thread;

        let cell = Arc::new(ValueCell::new(0));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.increment();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(cell.get(), 8000);
    }
}
