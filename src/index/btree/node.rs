//! B+-tree node view over a slotted page.
//!
//! Records are `key: i32` plus a 4-byte payload: the value in a leaf, a child
//! page id in an internal node. The node links live in the page's special
//! area:
//!
//! ```text
//! 4080  parent       u32
//! 4084  next         u32  (leaves only)
//! 4088  prev         u32  (leaves only)
//! 4092  first_child  u32  (internal only)
//! ```
//!
//! An internal node with `n` keys has `n + 1` children. `first_child` covers
//! keys below `keys[0]`, slot `i` carries the child for keys `>= keys[i]`.

use std::ops::{Deref, DerefMut};

use crate::common::{CorruptionKind, Error, PageId, Result};
use crate::storage::page::{read_u16, read_u32, Page, PageHeader, PageType, SlottedPage};

const LINK_PARENT: usize = 0;
const LINK_NEXT: usize = 4;
const LINK_PREV: usize = 8;
const LINK_FIRST_CHILD: usize = 12;

/// Bytes of payload carried by every record.
pub const PAYLOAD_SIZE: usize = 4;

/// A leaf or internal node.
pub struct Node<P> {
    page: SlottedPage<P>,
}

impl<P: Deref<Target = Page>> Node<P> {
    /// Wrap a page that must already be formatted as a tree node.
    pub fn open(page: P) -> Result<Self> {
        let raw_type = read_u16(page.as_slice(), PageHeader::OFFSET_PAGE_TYPE);
        let page = SlottedPage::new(page);
        match PageType::from_u16(raw_type) {
            PageType::Leaf | PageType::Internal => {
                page.check_pointers()?;
                Ok(Self { page })
            }
            PageType::Invalid => Err(Error::corruption(
                page.page_id().0,
                CorruptionKind::UnexpectedPageType(raw_type),
            )),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page.page_id()
    }

    pub fn page_type(&self) -> PageType {
        self.page.page_type()
    }

    pub fn is_leaf(&self) -> bool {
        self.page_type() == PageType::Leaf
    }

    /// Slots in use, tombstones included.
    pub fn slot_count(&self) -> usize {
        self.page.key_count() as usize
    }

    /// Live records.
    pub fn len(&self) -> Result<usize> {
        self.page.live_count()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn tombstone_count(&self) -> Result<usize> {
        self.page.tombstone_count()
    }

    fn link(&self, at: usize) -> PageId {
        PageId::new(read_u32(self.page.special(), at))
    }

    pub fn parent(&self) -> PageId {
        self.link(LINK_PARENT)
    }

    pub fn next(&self) -> PageId {
        self.link(LINK_NEXT)
    }

    pub fn prev(&self) -> PageId {
        self.link(LINK_PREV)
    }

    pub fn first_child(&self) -> PageId {
        self.link(LINK_FIRST_CHILD)
    }

    /// Decode the 4-byte payload of a live slot.
    fn payload_u32(&self, slot: u16) -> Result<u32> {
        let payload = self.page.get(slot)?;
        if payload.len() != PAYLOAD_SIZE {
            return Err(Error::corruption(
                self.page_id().0,
                CorruptionKind::SlotOutOfBounds(slot),
            ));
        }
        Ok(read_u32(payload, 0))
    }

    /// Live keys in order.
    pub fn keys(&self) -> Result<Vec<i32>> {
        Ok(self.page.records()?.iter().map(|r| r.key).collect())
    }

    /// Slot and value of the live record holding `key`.
    pub fn find(&self, key: i32) -> Result<Option<(u16, i32)>> {
        let count = self.page.key_count();
        let mut slot = self.page.lower_bound(key)?;
        while slot < count && self.page.key_at(slot)? == key {
            if !self.page.is_tombstone(slot)? {
                return Ok(Some((slot, self.payload_u32(slot)? as i32)));
            }
            slot += 1;
        }
        Ok(None)
    }

    /// Live `(key, value)` pairs of a leaf.
    pub fn leaf_entries(&self) -> Result<Vec<(i32, i32)>> {
        let mut entries = Vec::with_capacity(self.slot_count());
        for record in self.page.records()? {
            entries.push((record.key, self.payload_u32(record.slot)? as i32));
        }
        Ok(entries)
    }

    /// `(separator, right child)` pairs of an internal node.
    pub fn internal_entries(&self) -> Result<Vec<(i32, PageId)>> {
        let mut entries = Vec::with_capacity(self.slot_count());
        for record in self.page.records()? {
            entries.push((record.key, PageId::new(self.payload_u32(record.slot)?)));
        }
        Ok(entries)
    }

    /// All children of an internal node, leftmost first.
    pub fn children(&self) -> Result<Vec<PageId>> {
        let mut children = vec![self.first_child()];
        children.extend(self.internal_entries()?.into_iter().map(|(_, child)| child));
        Ok(children)
    }

    /// Child to descend into for `key`. Keys equal to a separator go right.
    pub fn child_for(&self, key: i32) -> Result<PageId> {
        let idx = self.page.upper_bound(key)?;
        if idx == 0 {
            Ok(self.first_child())
        } else {
            Ok(PageId::new(self.payload_u32(idx - 1)?))
        }
    }
}

impl<P: DerefMut<Target = Page>> Node<P> {
    /// Format `page` as an empty node with no links.
    pub fn init(page: P, page_id: PageId, page_type: PageType) -> Self {
        let mut page = SlottedPage::new(page);
        page.init(page_id, page_type);
        Self { page }
    }

    fn set_link(&mut self, at: usize, page_id: PageId) {
        self.page.write_special(at, &page_id.0.to_le_bytes());
    }

    pub fn set_parent(&mut self, page_id: PageId) {
        self.set_link(LINK_PARENT, page_id);
    }

    pub fn set_next(&mut self, page_id: PageId) {
        self.set_link(LINK_NEXT, page_id);
    }

    pub fn set_prev(&mut self, page_id: PageId) {
        self.set_link(LINK_PREV, page_id);
    }

    pub fn set_first_child(&mut self, page_id: PageId) {
        self.set_link(LINK_FIRST_CHILD, page_id);
    }

    pub fn leaf_insert(&mut self, key: i32, value: i32) -> Result<()> {
        self.page.insert(key, &value.to_le_bytes()).map(|_| ())
    }

    pub fn leaf_update(&mut self, slot: u16, value: i32) -> Result<()> {
        self.page.update(slot, &value.to_le_bytes())
    }

    /// Tombstone a leaf record.
    pub fn leaf_remove(&mut self, slot: u16) -> Result<()> {
        self.page.delete(slot)
    }

    /// Add a separator and the child holding keys `>= key`.
    pub fn internal_insert(&mut self, key: i32, right_child: PageId) -> Result<()> {
        self.page.insert(key, &right_child.0.to_le_bytes()).map(|_| ())
    }

    /// Replace the records of a leaf. Links are kept.
    pub fn rebuild_leaf(&mut self, entries: &[(i32, i32)]) -> Result<()> {
        self.page.clear();
        for &(key, value) in entries {
            self.leaf_insert(key, value)?;
        }
        Ok(())
    }

    /// Replace the children of an internal node. The parent link is kept.
    pub fn rebuild_internal(&mut self, first_child: PageId, entries: &[(i32, PageId)]) -> Result<()> {
        self.page.clear();
        self.set_first_child(first_child);
        for &(key, child) in entries {
            self.internal_insert(key, child)?;
        }
        Ok(())
    }

    /// Drop tombstones. Returns the bytes reclaimed.
    pub fn compact(&mut self) -> Result<usize> {
        self.page.compact()
    }
}
