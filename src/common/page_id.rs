//! Page identifier type.

use std::fmt;

/// Identifies a page in a page store.
///
/// Ids are handed out monotonically starting at 1 and never reused within one
/// store. Id 0 is reserved: it marks "no page" in parent and sibling links,
/// and block 0 of a page file holds the tree metadata instead of a node.
///
/// # Example
/// ```
/// use pagetree::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert!(!PageId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PageId(pub u32);

impl PageId {
    /// The null page id.
    pub const INVALID: PageId = PageId(0);

    /// First id a store hands out.
    pub const FIRST: PageId = PageId(1);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID names a real page.
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Byte offset of this page's block in a page file.
    #[inline]
    pub fn file_offset(&self) -> u64 {
        self.0 as u64 * crate::common::config::PAGE_SIZE as u64
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_invalid_is_zero() {
        assert!(!PageId::INVALID.is_valid());
        assert_eq!(PageId::INVALID.0, 0);
        assert_eq!(PageId::default(), PageId::INVALID);
        assert!(PageId::FIRST.is_valid());
    }

    #[test]
    fn test_page_id_file_offset() {
        assert_eq!(PageId::new(0).file_offset(), 0);
        assert_eq!(PageId::new(3).file_offset(), 3 * 4096);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
        assert_eq!(format!("{}", PageId::INVALID), "Page(INVALID)");
    }
}
