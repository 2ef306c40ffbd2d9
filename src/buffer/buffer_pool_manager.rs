//! Buffer Pool Manager - the page caching layer.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between a [`PageStore`] and memory
//! - Pin-based reference counting through RAII guards
//! - Dirty page write-back with checksum finalization
//! - LRU eviction of unpinned pages
//! - Verification of every page loaded from the store

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{CorruptionKind, Error, FrameId, PageId, Result};
use crate::storage::page::Page;
use crate::storage::{MemoryStore, PageStore};

/// Manages a bounded pool of frames caching pages of a [`PageStore`].
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │    store     │      │
/// │  │ Vec<FrameId> │  │ LruReplacer  │  │    Mutex     │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `page_table`: `RwLock`, many readers and few writers
/// - `free_list`, `replacer`, `store`: `Mutex`
/// - `frames`: fixed size, each [`Frame`] has internal locks
/// - `stats`: atomic counters
///
/// A thread must not hold two guards on the same page when one of them is a
/// write guard: the page lock is not reentrant.
///
/// # Verification
/// A block loaded from the store is accepted if it is entirely zero (an
/// allocated page nobody wrote yet) or if its checksum, magic and page id
/// all check out. Anything else is reported as [`Error::Corruption`].
pub struct BufferPoolManager {
    frames: Vec<Frame>,

    /// Maps resident page IDs to frame IDs.
    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Stack of free frame IDs (LIFO for cache locality).
    free_list: Mutex<Vec<FrameId>>,

    replacer: Mutex<LruReplacer>,

    store: Mutex<Box<dyn PageStore>>,

    stats: BufferPoolStats,

    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a buffer pool of `pool_size` frames over `store`.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, store: impl PageStore + 'static) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruReplacer::new()),
            store: Mutex::new(Box::new(store)),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    /// A buffer pool over a fresh [`MemoryStore`].
    pub fn in_memory(pool_size: usize) -> Self {
        Self::new(pool_size, MemoryStore::new())
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page for reading (shared access).
    ///
    /// # Errors
    /// - `Error::PageNotFound` / `Error::InvalidPageId` from the store
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - `Error::Corruption` if the stored block fails verification
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page for writing (exclusive access).
    ///
    /// Same errors as [`fetch_page_read`](Self::fetch_page_read).
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// [`fetch_page_read`](Self::fetch_page_read), discarding the error.
    pub fn checked_read_page(&self, page_id: PageId) -> Option<PageReadGuard<'_>> {
        self.fetch_page_read(page_id).ok()
    }

    /// [`fetch_page_write`](Self::fetch_page_write), discarding the error.
    pub fn checked_write_page(&self, page_id: PageId) -> Option<PageWriteGuard<'_>> {
        self.fetch_page_write(page_id).ok()
    }

    // ========================================================================
    // Public API: Create and delete pages
    // ========================================================================

    /// Reserve a fresh page id in the store without loading it.
    pub fn allocate_page_id(&self) -> Result<PageId> {
        let page_id = self.store.lock().allocate_page()?;
        self.stats.record_allocation();
        Ok(page_id)
    }

    /// Allocate a new page and pin it in the pool as a zeroed page.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from the store
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.get_free_frame()?;

        let page_id = match self.allocate_page_id() {
            Ok(page_id) => page_id,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };

        let frame = &self.frames[frame_id.0];
        frame.install_empty(page_id);
        frame.pin();

        self.page_table.write().insert(page_id, frame_id);
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        trace!(page_id = page_id.0, frame_id = frame_id.0, "new page");
        let lock = frame.page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Drop a page from the pool and release it in the store.
    ///
    /// The id is never handed out again.
    ///
    /// # Errors
    /// - `Error::PagePinned` if a guard still refers to the page
    /// - `Error::PageNotFound` if the store does not know the page
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        {
            let mut pt = self.page_table.write();
            if let Some(&frame_id) = pt.get(&page_id) {
                let frame = &self.frames[frame_id.0];
                if frame.is_pinned() {
                    return Err(Error::PagePinned(page_id.0));
                }

                pt.remove(&page_id);
                drop(pt);

                frame.reset();
                self.replacer.lock().remove(frame_id);
                self.free_list.lock().push(frame_id);
            }
        }

        self.store.lock().deallocate_page(page_id)?;
        debug!(page_id = page_id.0, "deleted page");
        Ok(())
    }

    // ========================================================================
    // Public API: Flush pages and metadata
    // ========================================================================

    /// Write a resident page back if it is dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = {
            let pt = self.page_table.read();
            match pt.get(&page_id) {
                Some(&fid) => fid,
                None => return Ok(()),
            }
        };

        self.flush_frame(frame_id, page_id)
    }

    /// Write back every dirty page and sync the store.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };

        for &(page_id, frame_id) in &pages {
            self.flush_frame(frame_id, page_id)?;
        }
        self.store.lock().sync()?;

        debug!(resident = pages.len(), "flushed buffer pool");
        Ok(())
    }

    /// Read block 0 of the store.
    pub fn read_meta_block(&self) -> Result<Page> {
        self.store.lock().read_meta()
    }

    /// Overwrite block 0 of the store.
    pub fn write_meta_block(&self, page: &Page) -> Result<()> {
        self.store.lock().write_meta(page)
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Number of resident pages.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Number of blocks in the backing store, the metadata block included.
    pub fn store_page_count(&self) -> u32 {
        self.store.lock().page_count()
    }

    /// Pin count of a resident page, `None` if it is not in the pool.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let pt = self.page_table.read();
        pt.get(&page_id)
            .map(|&frame_id| self.frames[frame_id.0].pin_count())
    }

    // ========================================================================
    // Internal: Called by PageGuard on drop
    // ========================================================================

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        if frame.unpin() == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        {
            let pt = self.page_table.read();
            if let Some(&frame_id) = pt.get(&page_id) {
                self.handle_cache_hit(frame_id);
                return Ok(frame_id);
            }
        }

        self.handle_cache_miss(page_id)
    }

    /// Pin the frame and refresh its LRU position.
    fn handle_cache_hit(&self, frame_id: FrameId) {
        self.frames[frame_id.0].pin();
        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        self.stats.record_hit();
    }

    /// Load a page from the store into a free (or evicted) frame.
    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        self.stats.record_miss();

        let (contents, fresh) = {
            let mut store = self.store.lock();
            let contents = store.read_page(page_id)?;
            (contents, store.is_fresh(page_id))
        };
        self.verify_loaded(page_id, &contents, fresh)?;

        let frame_id = self.get_free_frame()?;
        let frame = &self.frames[frame_id.0];

        let mut pt = self.page_table.write();
        if let Some(&existing) = pt.get(&page_id) {
            // Another thread loaded it first.
            drop(pt);
            self.free_list.lock().push(frame_id);
            self.handle_cache_hit(existing);
            return Ok(existing);
        }

        frame.load(page_id, &contents);
        frame.pin();
        pt.insert(page_id, frame_id);
        drop(pt);

        {
            let mut replacer = self.replacer.lock();
            replacer.record_access(frame_id);
            replacer.set_evictable(frame_id, false);
        }

        trace!(page_id = page_id.0, frame_id = frame_id.0, "loaded page");
        Ok(frame_id)
    }

    /// Accept a block that verifies as `page_id`, or an all-zero block the
    /// store still reports as fresh.
    fn verify_loaded(&self, page_id: PageId, page: &Page, fresh: bool) -> Result<()> {
        if fresh && page.is_zeroed() {
            return Ok(());
        }

        let result = page.validate().and_then(|()| {
            let stored_id = page.header().page_id;
            if stored_id == page_id {
                Ok(())
            } else {
                Err(CorruptionKind::PageIdMismatch(stored_id.0))
            }
        });

        result.map_err(|kind| {
            self.stats.record_corruption();
            warn!(page_id = page_id.0, %kind, "page failed verification");
            Error::corruption(page_id.0, kind)
        })
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_page()
    }

    /// Evict the least recently used unpinned page, writing it back first.
    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = self
            .replacer
            .lock()
            .evict()
            .ok_or(Error::NoFreeFrames)?;

        let frame = &self.frames[frame_id.0];
        let old_page_id = frame.page_id();

        if let Some(pid) = old_page_id {
            if let Err(e) = self.flush_frame(frame_id, pid) {
                // Keep the page resident and evictable.
                let mut replacer = self.replacer.lock();
                replacer.record_access(frame_id);
                replacer.set_evictable(frame_id, true);
                return Err(e);
            }
            self.page_table.write().remove(&pid);
        }

        frame.vacate();

        self.stats.record_eviction();
        debug!(frame_id = frame_id.0, page_id = ?old_page_id.map(|p| p.0), "evicted page");
        Ok(frame_id)
    }

    /// Write a frame back if dirty, with a freshly computed checksum.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.take_dirty() {
            let block = frame.sealed_copy();
            if let Err(e) = self.store.lock().write_page(page_id, &block) {
                frame.mark_dirty();
                return Err(e);
            }

            self.stats.record_write();
            trace!(page_id = page_id.0, "flushed page");
        }

        Ok(())
    }
}
