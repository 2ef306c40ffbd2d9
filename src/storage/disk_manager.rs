//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Allocating and releasing pages
//! - The metadata block at offset 0

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::common::config::{MAX_DB_SIZE_BYTES, MAX_PAGES, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;
use crate::storage::page_store::PageStore;

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// The database is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │  Meta   │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page N is located at file offset `N × PAGE_SIZE`. Block 0 holds the tree
/// metadata, so page 0 doubles as the invalid page id.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferPoolManager` is responsible
/// for serializing access to the disk manager.
///
/// # Durability
/// Writes go to the OS page cache; [`PageStore::sync`] issues `fsync()`.
/// The buffer pool syncs after a full flush.
pub struct DiskManager {
    file: File,
    /// Number of blocks in the file, metadata block included.
    page_count: u32,
    /// Pages released in this session. Not persisted.
    freed: HashSet<u32>,
    /// Pages allocated in this session and not yet written formatted.
    fresh: HashSet<u32>,
}

impl DiskManager {
    /// Create a new database file holding only an empty metadata block.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        let mut dm = Self {
            file,
            page_count: 0,
            freed: HashSet::new(),
            fresh: HashSet::new(),
        };
        dm.extend()?;
        dm.file.sync_all()?;

        debug!(path = %path.as_ref().display(), "created database file");
        Ok(dm)
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        // Trailing partial blocks are ignored.
        let file_size = file.metadata()?.len();
        if file_size >= MAX_DB_SIZE_BYTES {
            return Err(Error::StoreFull {
                max_pages: MAX_PAGES,
            });
        }
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        let mut dm = Self {
            file,
            page_count,
            freed: HashSet::new(),
            fresh: HashSet::new(),
        };
        if dm.page_count == 0 {
            dm.extend()?;
        }

        debug!(
            path = %path.as_ref().display(),
            page_count = dm.page_count,
            "opened database file"
        );
        Ok(dm)
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    /// Append one zeroed block.
    fn extend(&mut self) -> Result<PageId> {
        let next = self.page_count.checked_add(1).ok_or(Error::StoreFull {
            max_pages: MAX_PAGES,
        })?;
        let page_id = PageId::new(self.page_count);
        self.write_block(page_id, &[0u8; PAGE_SIZE])?;
        self.page_count = next;
        Ok(page_id)
    }

    fn check_data_page(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }
        if page_id.0 >= self.page_count || self.freed.contains(&page_id.0) {
            return Err(Error::PageNotFound(page_id.0));
        }
        Ok(())
    }

    fn read_block(&mut self, page_id: PageId) -> Result<Page> {
        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;
        Ok(page)
    }

    fn write_block(&mut self, page_id: PageId, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(page_id.file_offset()))?;
        self.file.write_all(bytes)?;
        Ok(())
    }
}

impl PageStore for DiskManager {
    fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        self.check_data_page(page_id)?;
        self.read_block(page_id)
    }

    fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_data_page(page_id)?;
        self.write_block(page_id, page.as_slice())?;
        if !page.is_zeroed() {
            self.fresh.remove(&page_id.0);
        }
        Ok(())
    }

    fn allocate_page(&mut self) -> Result<PageId> {
        // Released ids are not reused, so stale references fail loudly.
        let page_id = self.extend()?;
        self.fresh.insert(page_id.0);
        debug!(page_id = page_id.0, "allocated page on disk");
        Ok(page_id)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.check_data_page(page_id)?;
        self.write_block(page_id, &[0u8; PAGE_SIZE])?;
        self.freed.insert(page_id.0);
        self.fresh.remove(&page_id.0);
        Ok(())
    }

    fn read_meta(&mut self) -> Result<Page> {
        self.read_block(PageId::INVALID)
    }

    fn write_meta(&mut self, page: &Page) -> Result<()> {
        self.write_block(PageId::INVALID, page.as_slice())
    }

    #[inline]
    fn is_fresh(&self, page_id: PageId) -> bool {
        self.fresh.contains(&page_id.0)
    }

    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
