//! Storage layer - page stores and page formats.
//!
//! This module handles persistent storage:
//! - [`PageStore`] - Block store interface used by the buffer pool
//! - [`DiskManager`] - File-backed store
//! - [`MemoryStore`] - Volatile store
//! - [`page`] - Page types and layouts

mod disk_manager;
mod memory_store;
pub mod page;
mod page_store;

pub use disk_manager::DiskManager;
pub use memory_store::MemoryStore;
pub use page_store::PageStore;
