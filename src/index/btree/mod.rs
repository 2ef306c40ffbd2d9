//! Paged B+-tree index.
//!
//! - [`BPlusTree`] - Tree operations over the buffer pool
//! - [`Node`] - Leaf/internal view over a slotted page
//! - [`TreeMeta`] - Persisted root pointer in block 0
//! - [`NodeSummary`] - Decoded node for inspection

mod inspect;
mod meta;
mod node;
mod tree;

pub use inspect::NodeSummary;
pub use meta::{TreeMeta, TREE_FORMAT_VERSION, TREE_MAGIC};
pub use node::{Node, PAYLOAD_SIZE};
pub use tree::BPlusTree;
