//! Backing store abstraction for the buffer pool.

use crate::common::{PageId, Result};
use crate::storage::page::Page;

/// A block store addressed by [`PageId`].
///
/// Block 0 is reserved for the tree metadata and is only reachable through
/// [`read_meta`](PageStore::read_meta) / [`write_meta`](PageStore::write_meta);
/// data pages are numbered from [`PageId::FIRST`].
///
/// Implementations are single-threaded. The buffer pool serializes access.
pub trait PageStore: Send {
    /// Read a data page.
    ///
    /// # Errors
    /// `InvalidPageId` for page 0, `PageNotFound` for ids that were never
    /// allocated or have been deallocated.
    fn read_page(&mut self, page_id: PageId) -> Result<Page>;

    /// Write a data page previously returned by `allocate_page`.
    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()>;

    /// Reserve a new zeroed page.
    fn allocate_page(&mut self) -> Result<PageId>;

    /// Release a page. Later reads of the id fail with `PageNotFound`.
    fn deallocate_page(&mut self, page_id: PageId) -> Result<()>;

    /// Read the metadata block. All zeros if it was never written.
    fn read_meta(&mut self) -> Result<Page>;

    /// Overwrite the metadata block.
    fn write_meta(&mut self, page: &Page) -> Result<()>;

    /// `true` while `page_id` was allocated by this store instance and has
    /// not yet been written with formatted contents.
    ///
    /// Only such a page may read back as an all-zero block; anywhere else a
    /// zeroed block means the contents were lost.
    fn is_fresh(&self, page_id: PageId) -> bool;

    /// Number of blocks, the metadata block included.
    fn page_count(&self) -> u32;

    /// Make previous writes durable.
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}
