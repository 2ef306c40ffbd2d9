//! RAII guards for page access.
//!
//! - [`PageReadGuard`] - Shared read access (multiple allowed)
//! - [`PageWriteGuard`] - Exclusive write access; marks the frame dirty and
//!   refreshes the page checksum when dropped
//!
//! Both guards unpin the page when dropped, so a page can only be evicted
//! once no guard refers to it.

use std::fmt;
use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId};
use crate::storage::page::{Page, SlottedPage};

use super::buffer_pool_manager::BufferPoolManager;

/// Guard for read-only page access.
///
/// # Example
/// ```
/// use pagetree::BufferPoolManager;
///
/// let bpm = BufferPoolManager::in_memory(4);
/// let page_id = bpm.new_page().unwrap().page_id();
///
/// let guard = bpm.fetch_page_read(page_id).unwrap();
/// assert!(guard.is_zeroed());
/// ```
pub struct PageReadGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockReadGuard<'a, Page>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// View the page as a slotted page.
    pub fn slotted(&self) -> SlottedPage<&Page> {
        SlottedPage::new(&**self)
    }

    /// Release the page now. Same as dropping the guard.
    pub fn drop_guard(self) {}
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl fmt::Debug for PageReadGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageReadGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .finish()
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_page_internal(self.frame_id, false);
    }
}

/// Guard for exclusive write access to a page.
///
/// On drop the checksum of a formatted page is recomputed, the frame is
/// marked dirty and the page is unpinned.
///
/// # Example
/// ```
/// use pagetree::storage::page::PageType;
/// use pagetree::BufferPoolManager;
///
/// let bpm = BufferPoolManager::in_memory(4);
/// let mut guard = bpm.new_page().unwrap();
/// let page_id = guard.page_id();
///
/// let mut node = guard.slotted_mut();
/// node.init(page_id, PageType::Leaf);
/// node.insert(1, b"one").unwrap();
/// drop(guard);
///
/// let guard = bpm.fetch_page_read(page_id).unwrap();
/// assert!(guard.verify());
/// assert_eq!(guard.slotted().get(0).unwrap(), b"one");
/// ```
pub struct PageWriteGuard<'a> {
    bpm: &'a BufferPoolManager,
    frame_id: FrameId,
    page_id: PageId,
    lock: RwLockWriteGuard<'a, Page>,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        bpm: &'a BufferPoolManager,
        frame_id: FrameId,
        page_id: PageId,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            bpm,
            frame_id,
            page_id,
            lock,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn slotted(&self) -> SlottedPage<&Page> {
        SlottedPage::new(&**self)
    }

    /// Mutable slotted view. The checksum is refreshed when the guard drops,
    /// not after each change.
    pub fn slotted_mut(&mut self) -> SlottedPage<&mut Page> {
        SlottedPage::new(&mut **self)
    }

    /// Release the page now. Same as dropping the guard.
    pub fn drop_guard(self) {}
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}

impl fmt::Debug for PageWriteGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageWriteGuard")
            .field("page_id", &self.page_id)
            .field("frame_id", &self.frame_id)
            .finish()
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.lock.seal();
        self.bpm.unpin_page_internal(self.frame_id, true);
    }
}
