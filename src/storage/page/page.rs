//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array that serves as the unit of I/O
//! between a page store and memory. Pages live in [`Frame`]s within the
//! buffer pool; the frame carries the volatile dirty flag and pin count.
//!
//! [`Frame`]: crate::buffer::Frame

use crate::common::config::PAGE_SIZE;
use crate::common::CorruptionKind;

use super::page_header::{PageHeader, PAGE_MAGIC};

/// A page of data (4KB, 4KB-aligned).
///
/// The buffer holds the header, slot directory, record area and node link
/// area back to back; see [`SlottedPage`](super::SlottedPage) for the layout.
///
/// `Page` does not implement `Clone` outside tests: copying 4KB should be
/// explicit, use [`Page::copy_from`].
///
/// # Example
/// ```
/// use pagetree::storage::page::Page;
///
/// let mut page = Page::new();
/// assert!(page.is_zeroed());
/// page.as_mut_slice()[100] = 0xFF;
/// assert!(!page.is_zeroed());
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Overwrite this page with the contents of another.
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }

    /// Get the size of a page.
    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }

    /// `true` if every byte is zero: an allocated block that was never written.
    pub fn is_zeroed(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Write a page header.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// `true` once the page carries the format magic.
    pub fn is_formatted(&self) -> bool {
        self.header().magic == PAGE_MAGIC
    }

    /// Compute and store the checksum in the header.
    pub fn update_checksum(&mut self) {
        PageHeader::finalize_checksum(&mut self.data);
    }

    /// Refresh the checksum of a formatted page.
    ///
    /// Unformatted pages are left alone so a zeroed page stays recognisable as
    /// never written.
    pub fn seal(&mut self) {
        if self.is_formatted() {
            self.update_checksum();
        }
    }

    /// Verify checksum and magic.
    pub fn verify(&self) -> bool {
        PageHeader::verify(&self.data)
    }

    /// Verify checksum and magic, reporting the failure.
    pub fn validate(&self) -> std::result::Result<(), CorruptionKind> {
        PageHeader::validate(&self.data)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page").field("header", &self.header()).finish()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.copy_from(self);
        new_page
    }
}
