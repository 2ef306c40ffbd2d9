//! Configuration constants and tree options.

use crate::common::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// Every page is read and written as one block of this size. Block `N` of a
/// page file lives at byte offset `N × PAGE_SIZE`.
///
/// # Memory Layout
/// With 4KB pages and 32-bit page ids:
/// - Max pages: 2^32 = 4,294,967,296 pages
/// - Max file size: 4,294,967,296 × 4KB = 16TB
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of pages with u32 PageId.
pub const MAX_PAGES: u64 = (u32::MAX as u64) + 1;

/// Maximum theoretical page file size in bytes.
pub const MAX_DB_SIZE_BYTES: u64 = MAX_PAGES * PAGE_SIZE as u64;

/// Smallest order a tree accepts.
///
/// With order 3 a node holds two keys; anything smaller cannot split into two
/// non-empty halves.
pub const MIN_ORDER: usize = 3;

/// Order used when none is given.
pub const DEFAULT_ORDER: usize = 128;

/// Default number of frames in the buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Smallest pool the tree can run in.
///
/// Tree operations hold at most two page guards at a time.
pub const MIN_POOL_SIZE: usize = 4;

/// Options for building a [`BPlusTree`](crate::index::BPlusTree).
///
/// # Example
/// ```
/// use pagetree::common::config::TreeConfig;
///
/// let config = TreeConfig::default().with_order(4).with_pool_size(16);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.max_keys(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Maximum fan-out. Nodes hold at most `order - 1` keys.
    pub order: usize,
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl TreeConfig {
    /// Set the tree order.
    #[must_use]
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Set the buffer pool size.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Maximum keys per node before it must split.
    #[inline]
    pub fn max_keys(&self) -> usize {
        self.order - 1
    }

    /// Check that the options describe a usable tree.
    pub fn validate(&self) -> Result<()> {
        validate_order(self.order)?;
        if self.pool_size < MIN_POOL_SIZE {
            return Err(Error::InvalidConfig(format!(
                "pool_size {} is below the minimum of {}",
                self.pool_size, MIN_POOL_SIZE
            )));
        }
        Ok(())
    }
}

/// Reject orders that cannot produce two non-empty halves on split.
pub fn validate_order(order: usize) -> Result<()> {
    // Orders beyond u32 could not be recorded in the metadata block.
    if order < MIN_ORDER || order > u32::MAX as usize {
        return Err(Error::InvalidOrder(order));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_max_db_size() {
        let expected = 16 * 1024u64 * 1024 * 1024 * 1024;
        assert_eq!(MAX_DB_SIZE_BYTES, expected);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = TreeConfig::default();
        assert_eq!(config.order, DEFAULT_ORDER);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_small_order() {
        let config = TreeConfig::default().with_order(2);
        assert!(matches!(config.validate(), Err(Error::InvalidOrder(2))));
        assert!(TreeConfig::default().with_order(MIN_ORDER).validate().is_ok());
    }

    #[test]
    fn test_config_rejects_small_pool() {
        let config = TreeConfig::default().with_pool_size(MIN_POOL_SIZE - 1);
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
