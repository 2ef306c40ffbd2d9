//! pagetree - a paged B+-tree on slotted pages and a bounded buffer pool.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Index Layer (index/)                                           │
//! │    BPlusTree: search, insert, remove, range scans, splits       │
//! │    Node view, metadata block, inspection                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Buffer Pool (buffer/)                                          │
//! │    BufferPoolManager + Frame + LRU replacer + statistics        │
//! │    RAII read/write guards, verification on load                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Storage Layer (storage/)                                       │
//! │    PageStore: DiskManager (file) | MemoryStore                  │
//! │    Page + PageHeader (FNV-1a checksum) + SlottedPage            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, FrameId, Error, config)
//! - [`storage`] - Page stores and page formats
//! - [`buffer`] - Buffer pool management
//! - [`index`] - The B+-tree
//!
//! # Quick Start
//! ```no_run
//! use pagetree::{BPlusTree, TreeConfig};
//!
//! let config = TreeConfig::default().with_order(64);
//! let mut tree = BPlusTree::create_file("my_tree.db", config).unwrap();
//! tree.insert(42, 4200).unwrap();
//! tree.flush().unwrap();
//!
//! let tree = BPlusTree::open_file("my_tree.db", config).unwrap();
//! assert_eq!(tree.search(42).unwrap(), Some(4200));
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

pub use common::config::{TreeConfig, PAGE_SIZE};
pub use common::{CorruptionKind, Error, FrameId, PageId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, Frame, StatsSnapshot};
pub use index::btree::NodeSummary;
pub use index::BPlusTree;
pub use storage::page::{Page, PageHeader, PageType, SlottedPage};
pub use storage::{DiskManager, MemoryStore, PageStore};
