//! A lock-free concurrent prefix tree keyed by sequences of positive `u64` symbols, with
//! a 64-bit counter at every node.
//!
//! Any number of threads may call [`Node::at`] to descend into (creating on demand) a
//! child reachable under a given symbol, and may read or mutate a node's counter through
//! [`Node::value`]/[`Node::set_value`]/[`Node::inc_value`]/[`Node::increment_and_get`],
//! all without taking a lock. A [`Node`] handle returned by `at` stays valid for the
//! lifetime of the [`Tree`] it came from and may be freely shared across threads.
//!
//! ```
//! use lockfree_prefix_trie::Tree;
//!
//! let tree = Tree::new();
//! let node = tree.root().at(1).unwrap().at(2).unwrap();
//! node.inc_value();
//! assert_eq!(node.value(), 1);
//! assert_eq!(tree.root().at(1).unwrap().at(2).unwrap().value(), 1);
//! ```

mod cell;
mod children;
mod error;
mod hash;
mod node;
mod pool;
mod symbol;
mod tree;

pub use error::Error;
pub use node::Node;
pub use tree::Tree;
