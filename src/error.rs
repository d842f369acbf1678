use thiserror::Error;

/// Everything that can go wrong while navigating or allocating into the trie.
///
/// Both variants are surfaced synchronously and leave the tree unmodified — every other
/// condition (CAS failures, frozen slots, array saturation) is expected and handled
/// internally by retry and growth.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `symbol` was zero or one of the reserved sentinel values, so it can never label an
    /// edge of the trie.
    #[error("symbol {symbol} is not a valid positive, non-reserved key")]
    InvalidSymbol {
        /// The offending value the caller passed to [`crate::Node::at`].
        symbol: u64,
    },
    /// The backing allocator could not provide a new node or child array.
    #[error("allocator exhausted while growing the trie")]
    AllocationExhausted,
}
