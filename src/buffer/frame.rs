//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus the volatile state the pool needs:
//! which page is resident, how many guards pin it, and whether it must be
//! written back before reuse.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// The pool allocates a fixed number of frames at startup and recycles them.
///
/// # Thread Safety
/// - `page`: `RwLock`, so many readers or one writer per page
/// - `page_id`: `Mutex`
/// - `pin_count` / `is_dirty`: atomics, updated without the page lock
pub struct Frame {
    page: RwLock<Page>,
    page_id: Mutex<Option<PageId>>,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            page_id: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    /// Shared access to the page bytes.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Exclusive access to the page bytes.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        *self.page_id.lock()
    }

    /// Make `page_id` resident with the given contents. The frame comes out
    /// clean.
    pub fn load(&self, page_id: PageId, contents: &Page) {
        self.page_mut().copy_from(contents);
        *self.page_id.lock() = Some(page_id);
        self.is_dirty.store(false, Ordering::Release);
    }

    /// Make `page_id` resident as a zeroed page.
    pub fn install_empty(&self, page_id: PageId) {
        self.page_mut().reset();
        *self.page_id.lock() = Some(page_id);
        self.is_dirty.store(false, Ordering::Release);
    }

    /// Forget the resident page, returning its id. The bytes stay until the
    /// next `load` or `install_empty`.
    pub fn vacate(&self) -> Option<PageId> {
        self.is_dirty.store(false, Ordering::Release);
        self.page_id.lock().take()
    }

    /// A copy of the page with its checksum refreshed, ready to be written.
    ///
    /// Blocks while a write guard holds the page.
    pub fn sealed_copy(&self) -> Page {
        let mut block = Page::new();
        block.copy_from(&self.page());
        block.seal();
        block
    }

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// Clear the dirty flag, returning whether it was set.
    ///
    /// A write guard dropped after this call sets the flag again, so a
    /// concurrent change is never lost by a flush in progress.
    #[inline]
    pub fn take_dirty(&self) -> bool {
        self.is_dirty.swap(false, Ordering::AcqRel)
    }

    /// Return the frame to the empty state.
    pub fn reset(&self) {
        self.page_mut().reset();
        self.vacate();
        self.pin_count.store(0, Ordering::Release);
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}
