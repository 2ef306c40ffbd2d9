//! Paged B+-tree over the buffer pool.

use std::path::Path;

use tracing::debug;

use crate::buffer::{BufferPoolManager, PageWriteGuard};
use crate::common::config::{validate_order, TreeConfig};
use crate::common::{CorruptionKind, Error, PageId, Result};
use crate::storage::page::PageType;
use crate::storage::DiskManager;

use super::meta::TreeMeta;
use super::node::Node;

/// A B+-tree mapping `i32` keys to `i32` values, one node per page.
///
/// All page access goes through the owned [`BufferPoolManager`]. Leaves are
/// doubly linked in key order for range scans. Every node records its parent
/// so splits propagate upward without a descent stack.
///
/// The tree holds at most two page guards at a time and never two on the same
/// page, so any pool of at least four frames works.
///
/// # Example
/// ```
/// use pagetree::{BPlusTree, TreeConfig};
///
/// let mut tree = BPlusTree::in_memory(TreeConfig::default().with_order(4)).unwrap();
/// for key in [10, 20, 5, 15, 25, 30, 35, 40] {
///     tree.insert(key, key * 10).unwrap();
/// }
///
/// assert_eq!(tree.search(15).unwrap(), Some(150));
/// assert_eq!(tree.search(100).unwrap(), None);
/// let keys: Vec<i32> = tree.range_query(10, 30).unwrap().iter().map(|&(k, _)| k).collect();
/// assert_eq!(keys, vec![10, 15, 20, 25, 30]);
/// ```
pub struct BPlusTree {
    bpm: BufferPoolManager,
    root_page_id: PageId,
    first_leaf_page_id: PageId,
    order: usize,
}

impl BPlusTree {
    /// Build an empty tree (a single empty leaf as root) in a fresh store.
    ///
    /// # Errors
    /// - `Error::InvalidOrder` if `order < MIN_ORDER`
    /// - `Error::InvalidConfig` if the store already holds a tree
    pub fn create(bpm: BufferPoolManager, order: usize) -> Result<Self> {
        validate_order(order)?;
        if TreeMeta::decode(&bpm.read_meta_block()?)?.is_some() {
            return Err(Error::InvalidConfig(
                "store already holds a tree".to_string(),
            ));
        }

        let root = {
            let mut guard = bpm.new_page()?;
            let root = guard.page_id();
            Node::init(&mut *guard, root, PageType::Leaf);
            root
        };

        let tree = Self {
            bpm,
            root_page_id: root,
            first_leaf_page_id: root,
            order,
        };
        tree.bpm.flush_page(root)?;
        tree.write_meta()?;

        debug!(order, root = root.0, "created tree");
        Ok(tree)
    }

    /// Reopen the tree recorded in the store's metadata block.
    ///
    /// # Errors
    /// `Error::Corruption` if the metadata block is missing or invalid, or if
    /// the root page fails verification.
    pub fn open(bpm: BufferPoolManager) -> Result<Self> {
        let meta = TreeMeta::decode(&bpm.read_meta_block()?)?
            .ok_or_else(|| Error::corruption(0, CorruptionKind::BadMetadata))?;

        {
            let guard = bpm.fetch_page_read(meta.root)?;
            Node::open(&*guard)?;
        }

        debug!(order = meta.order, root = meta.root.0, "opened tree");
        Ok(Self {
            bpm,
            root_page_id: meta.root,
            first_leaf_page_id: meta.first_leaf,
            order: meta.order as usize,
        })
    }

    /// An empty tree backed by memory only.
    pub fn in_memory(config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Self::create(BufferPoolManager::in_memory(config.pool_size), config.order)
    }

    /// An empty tree in a new database file.
    pub fn create_file<P: AsRef<Path>>(path: P, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        let dm = DiskManager::create(path)?;
        Self::create(BufferPoolManager::new(config.pool_size, dm), config.order)
    }

    /// Reopen a database file. The order stored in the file wins over
    /// `config.order`.
    pub fn open_file<P: AsRef<Path>>(path: P, config: TreeConfig) -> Result<Self> {
        config.validate()?;
        let dm = DiskManager::open(path)?;
        Self::open(BufferPoolManager::new(config.pool_size, dm))
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// Maximum keys per node.
    #[inline]
    pub fn max_keys(&self) -> usize {
        self.order - 1
    }

    #[inline]
    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    #[inline]
    pub fn first_leaf_page_id(&self) -> PageId {
        self.first_leaf_page_id
    }

    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.bpm
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Descend from the root to the leaf responsible for `key`.
    pub fn find_leaf(&self, key: i32) -> Result<PageId> {
        let mut page_id = self.root_page_id;
        loop {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let node = Node::open(&*guard)?;
            if node.is_leaf() {
                return Ok(page_id);
            }
            page_id = node.child_for(key)?;
        }
    }

    /// Value stored under `key`, if any.
    pub fn search(&self, key: i32) -> Result<Option<i32>> {
        let leaf = self.find_leaf(key)?;
        let guard = self.bpm.fetch_page_read(leaf)?;
        let found = Node::open(&*guard)?.find(key)?;
        Ok(found.map(|(_, value)| value))
    }

    /// Pairs with `start <= key <= end`, ascending.
    pub fn range_query(&self, start: i32, end: i32) -> Result<Vec<(i32, i32)>> {
        let mut out = Vec::new();
        if start > end {
            return Ok(out);
        }

        let mut page_id = self.find_leaf(start)?;
        while page_id.is_valid() {
            let guard = self.bpm.fetch_page_read(page_id)?;
            let node = Node::open(&*guard)?;
            for (key, value) in node.leaf_entries()? {
                if key > end {
                    return Ok(out);
                }
                if key >= start {
                    out.push((key, value));
                }
            }
            page_id = node.next();
        }
        Ok(out)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Insert or overwrite `key`. The touched leaf is flushed before
    /// returning.
    pub fn insert(&mut self, key: i32, value: i32) -> Result<()> {
        let leaf_id = self.find_leaf(key)?;
        let mut guard = self.bpm.fetch_page_write(leaf_id)?;
        let mut leaf = Node::open(&mut *guard)?;

        if let Some((slot, _)) = leaf.find(key)? {
            leaf.leaf_update(slot, value)?;
            drop(leaf);
            drop(guard);
            return self.bpm.flush_page(leaf_id);
        }

        if leaf.tombstone_count()? > 0 {
            leaf.compact()?;
        }

        if leaf.slot_count() < self.max_keys() {
            match leaf.leaf_insert(key, value) {
                Ok(()) => {
                    drop(leaf);
                    drop(guard);
                    return self.bpm.flush_page(leaf_id);
                }
                Err(Error::OutOfSpace { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let mut entries = leaf.leaf_entries()?;
        let pos = entries.partition_point(|&(k, _)| k < key);
        entries.insert(pos, (key, value));
        drop(leaf);

        if let Some(new_root) = self.split_leaf(guard, entries)? {
            self.root_page_id = new_root;
        }
        Ok(())
    }

    /// Tombstone `key`, returning the value it held. Nodes are never merged.
    pub fn remove(&mut self, key: i32) -> Result<Option<i32>> {
        let leaf_id = self.find_leaf(key)?;
        let mut guard = self.bpm.fetch_page_write(leaf_id)?;
        let mut leaf = Node::open(&mut *guard)?;

        let Some((slot, value)) = leaf.find(key)? else {
            return Ok(None);
        };
        leaf.leaf_remove(slot)?;
        drop(leaf);
        drop(guard);
        self.bpm.flush_page(leaf_id)?;
        Ok(Some(value))
    }

    /// Compact every leaf carrying tombstones. Returns the bytes reclaimed.
    pub fn compact_leaves(&mut self) -> Result<usize> {
        let mut reclaimed = 0;
        for page_id in self.leaf_chain()? {
            let mut guard = self.bpm.fetch_page_write(page_id)?;
            let mut leaf = Node::open(&mut *guard)?;
            if leaf.tombstone_count()? == 0 {
                continue;
            }
            reclaimed += leaf.compact()?;
            drop(leaf);
            drop(guard);
            self.bpm.flush_page(page_id)?;
        }
        debug!(reclaimed, "compacted leaves");
        Ok(reclaimed)
    }

    /// Write back every dirty page and the metadata block, then sync.
    pub fn flush(&self) -> Result<()> {
        self.write_meta()?;
        self.bpm.flush_all_pages()
    }

    // ========================================================================
    // Splits
    // ========================================================================

    // Splits take `&self` because the guard being split borrows the pool.
    // They return the id of a newly grown root, if any.

    /// Split an overflowing leaf. `entries` holds its records plus the new one.
    fn split_leaf(
        &self,
        mut guard: PageWriteGuard<'_>,
        entries: Vec<(i32, i32)>,
    ) -> Result<Option<PageId>> {
        let left_id = guard.page_id();
        let mid = (entries.len() + 1) / 2;
        let (left_entries, right_entries) = entries.split_at(mid);
        let separator = right_entries[0].0;

        let mut right_guard = self.bpm.new_page()?;
        let right_id = right_guard.page_id();

        let (parent_id, old_next) = {
            let mut left = Node::open(&mut *guard)?;
            let links = (left.parent(), left.next());
            left.rebuild_leaf(left_entries)?;
            left.set_next(right_id);
            links
        };
        {
            let mut right = Node::init(&mut *right_guard, right_id, PageType::Leaf);
            right.rebuild_leaf(right_entries)?;
            right.set_parent(parent_id);
            right.set_prev(left_id);
            right.set_next(old_next);
        }
        drop(guard);
        drop(right_guard);

        if old_next.is_valid() {
            let mut next_guard = self.bpm.fetch_page_write(old_next)?;
            Node::open(&mut *next_guard)?.set_prev(right_id);
            drop(next_guard);
            self.bpm.flush_page(old_next)?;
        }
        self.bpm.flush_page(left_id)?;
        self.bpm.flush_page(right_id)?;

        debug!(
            left = left_id.0,
            right = right_id.0,
            separator,
            "split leaf"
        );
        self.insert_into_parent(left_id, separator, right_id, parent_id)
    }

    /// Split an overflowing internal node. `entries` holds its separators
    /// plus the new one; `first_child` is unchanged by the insert.
    fn split_internal(
        &self,
        mut guard: PageWriteGuard<'_>,
        first_child: PageId,
        entries: Vec<(i32, PageId)>,
    ) -> Result<Option<PageId>> {
        let left_id = guard.page_id();
        let len = entries.len();
        // Both halves keep at least one separator.
        let mid = ((len + 1) / 2).min(len.saturating_sub(2));
        let (promoted, right_first_child) = entries[mid];
        let left_entries = &entries[..mid];
        let right_entries = &entries[mid + 1..];

        let mut right_guard = self.bpm.new_page()?;
        let right_id = right_guard.page_id();

        let parent_id = {
            let mut left = Node::open(&mut *guard)?;
            let parent = left.parent();
            left.rebuild_internal(first_child, left_entries)?;
            parent
        };
        {
            let mut right = Node::init(&mut *right_guard, right_id, PageType::Internal);
            right.rebuild_internal(right_first_child, right_entries)?;
            right.set_parent(parent_id);
        }
        drop(guard);
        drop(right_guard);

        let moved = std::iter::once(right_first_child).chain(right_entries.iter().map(|&(_, c)| c));
        for child in moved {
            self.set_parent_of(child, right_id)?;
        }
        self.bpm.flush_page(left_id)?;
        self.bpm.flush_page(right_id)?;

        debug!(
            left = left_id.0,
            right = right_id.0,
            promoted,
            "split internal node"
        );
        self.insert_into_parent(left_id, promoted, right_id, parent_id)
    }

    /// Register `right` (holding keys `>= key`) next to `left` in their parent.
    fn insert_into_parent(
        &self,
        left_id: PageId,
        key: i32,
        right_id: PageId,
        parent_id: PageId,
    ) -> Result<Option<PageId>> {
        if !parent_id.is_valid() {
            return self.grow_root(left_id, key, right_id).map(Some);
        }

        let mut guard = self.bpm.fetch_page_write(parent_id)?;
        let mut parent = Node::open(&mut *guard)?;

        if parent.slot_count() < self.max_keys() {
            match parent.internal_insert(key, right_id) {
                Ok(()) => {
                    drop(parent);
                    drop(guard);
                    self.bpm.flush_page(parent_id)?;
                    return Ok(None);
                }
                Err(Error::OutOfSpace { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        let first_child = parent.first_child();
        let mut entries = parent.internal_entries()?;
        let pos = entries.partition_point(|&(k, _)| k <= key);
        entries.insert(pos, (key, right_id));
        drop(parent);

        self.split_internal(guard, first_child, entries)
    }

    /// Put a new root above `left` and `right` and record it in the metadata
    /// block.
    fn grow_root(&self, left_id: PageId, key: i32, right_id: PageId) -> Result<PageId> {
        let root_id = {
            let mut guard = self.bpm.new_page()?;
            let root_id = guard.page_id();
            let mut root = Node::init(&mut *guard, root_id, PageType::Internal);
            root.set_first_child(left_id);
            root.internal_insert(key, right_id)?;
            root_id
        };

        self.set_parent_of(left_id, root_id)?;
        self.set_parent_of(right_id, root_id)?;
        self.bpm.flush_page(root_id)?;
        self.write_meta_with_root(root_id)?;

        debug!(root = root_id.0, separator = key, "grew new root");
        Ok(root_id)
    }

    fn set_parent_of(&self, child: PageId, parent: PageId) -> Result<()> {
        {
            let mut guard = self.bpm.fetch_page_write(child)?;
            Node::open(&mut *guard)?.set_parent(parent);
        }
        self.bpm.flush_page(child)
    }

    fn write_meta(&self) -> Result<()> {
        self.write_meta_with_root(self.root_page_id)
    }

    fn write_meta_with_root(&self, root: PageId) -> Result<()> {
        let meta = TreeMeta {
            order: self.order as u32,
            root,
            first_leaf: self.first_leaf_page_id,
        };
        self.bpm.write_meta_block(&meta.encode())
    }
}
