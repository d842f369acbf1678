//! Reserved sentinel values for edge symbols.
//!
//! A legal symbol is any `u64` other than the two reserved here: zero marks an unused
//! slot, and [`FROZEN`] marks a slot that has been copied into a successor child array
//! and must no longer be written to (spec.md §3, §9 "Frozen sentinel").

use crate::error::Error;

/// Marks an unused slot in a Linear or Hash child array.
pub(crate) const EMPTY: u64 = 0;

/// Marks a slot whose child has already been copied into the node's successor child
/// array. Readers may still follow the child reference stored alongside it; writers must
/// restart and look up the node's current `children` pointer.
pub(crate) const FROZEN: u64 = u64::MAX;

/// Rejects zero and the frozen sentinel; every other `u64` is a legal edge symbol.
pub(crate) fn validate(symbol: u64) -> Result<u64, Error> {
    if symbol == EMPTY || symbol == FROZEN {
        Err(Error::InvalidSymbol { symbol })
    } else {
        Ok(symbol)
    }
}
