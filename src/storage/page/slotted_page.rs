//! Slotted page format for keyed variable-length records.
//!
//! # Page Layout
//! ```text
//! 0          +----------------------+
//!            |    Page Header       |  30 bytes (see page_header.rs)
//! 30         +----------------------+
//!            |    Slot Directory    |  8 bytes per slot (offset u32, length u32)
//!            |      [slot 0]        |  kept sorted by key, grows toward the
//!            |      [slot 1]        |  record area
//!            |        ...           |
//! lower_ptr  +----------------------+
//!            |    Free Space        |
//! upper_ptr  +----------------------+
//!            |    Records           |  key (i32) + payload, packed downward
//!            |        ...           |  from DATA_END
//! 4080       +----------------------+
//!            |    Special Area      |  16 bytes owned by the node layer
//! 4096       +----------------------+
//! ```
//!
//! A slot with `length == 0` is a tombstone: the record is logically deleted
//! but its bytes stay in place (and its key stays readable for binary search)
//! until [`SlottedPage::compact`] runs.

use std::ops::{Deref, DerefMut, Range};

use crate::common::config::PAGE_SIZE;
use crate::common::{CorruptionKind, Error, PageId, Result};

use super::page::Page;
use super::page_header::{read_u16, read_u32, write_u16, write_u32, PageHeader, PageType};

/// Size of one slot directory entry.
pub const SLOT_SIZE: usize = 8;

/// Size of the key prefix of every record.
pub const KEY_SIZE: usize = 4;

/// Bytes reserved at the end of the page for the node layer.
pub const SPECIAL_SIZE: usize = 16;

/// End of the record area (start of the special area).
pub const DATA_END: usize = PAGE_SIZE - SPECIAL_SIZE;

/// Largest payload a single empty page can hold.
pub const MAX_PAYLOAD_SIZE: usize = DATA_END - PageHeader::SIZE - SLOT_SIZE - KEY_SIZE;

/// One entry of the slot directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    /// Page offset of the record.
    pub offset: u32,
    /// Record length including the key, 0 for a tombstone.
    pub length: u32,
}

impl SlotEntry {
    /// `true` if the slot has been logically deleted.
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.length == 0
    }
}

/// A live record borrowed from a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub slot: u16,
    pub key: i32,
    pub payload: &'a [u8],
}

/// How many records with `payload_len`-byte payloads fit in an empty page.
pub const fn capacity(payload_len: usize) -> usize {
    (DATA_END - PageHeader::SIZE) / (SLOT_SIZE + KEY_SIZE + payload_len)
}

/// A slotted view over a [`Page`].
///
/// Works over anything that derefs to a page: `&Page`, `&mut Page` or the
/// buffer pool's guards. Read operations need `Deref`, mutations `DerefMut`.
///
/// Every accessor checks the header pointers and the slot's record bounds
/// before touching the record area, so a damaged page yields
/// [`Error::Corruption`] rather than a panic or garbage.
///
/// # Example
/// ```
/// use pagetree::storage::page::{Page, PageType, SlottedPage};
/// use pagetree::PageId;
///
/// let mut page = Page::new();
/// let mut slotted = SlottedPage::new(&mut page);
/// slotted.init(PageId::new(1), PageType::Leaf);
///
/// slotted.insert(20, b"twenty").unwrap();
/// slotted.insert(10, b"ten").unwrap();
///
/// assert_eq!(slotted.key_at(0).unwrap(), 10);
/// assert_eq!(slotted.get(1).unwrap(), b"twenty");
/// ```
pub struct SlottedPage<P> {
    page: P,
}

impl<P: Deref<Target = Page>> SlottedPage<P> {
    /// Wrap a page. The page is not checked until it is accessed.
    #[inline]
    pub fn new(page: P) -> Self {
        Self { page }
    }

    /// Give back the wrapped page.
    #[inline]
    pub fn into_inner(self) -> P {
        self.page
    }

    #[inline]
    fn data(&self) -> &[u8] {
        self.page.as_slice()
    }

    /// Decode the full header.
    pub fn header(&self) -> PageHeader {
        self.page.header()
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(read_u32(self.data(), PageHeader::OFFSET_PAGE_ID))
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_u16(read_u16(self.data(), PageHeader::OFFSET_PAGE_TYPE))
    }

    pub fn lsn(&self) -> u64 {
        self.header().lsn
    }

    /// Number of slots, tombstones included.
    #[inline]
    pub fn key_count(&self) -> u16 {
        read_u16(self.data(), PageHeader::OFFSET_KEY_COUNT)
    }

    #[inline]
    fn upper_ptr(&self) -> u16 {
        read_u16(self.data(), PageHeader::OFFSET_UPPER_PTR)
    }

    #[inline]
    fn lower_ptr(&self) -> u16 {
        read_u16(self.data(), PageHeader::OFFSET_LOWER_PTR)
    }

    /// Bytes between the slot directory and the record area.
    pub fn free_space(&self) -> usize {
        (self.upper_ptr() as usize).saturating_sub(self.lower_ptr() as usize)
    }

    /// `true` if a record with this payload length fits right now.
    pub fn can_fit(&self, payload_len: usize) -> bool {
        SLOT_SIZE + KEY_SIZE + payload_len <= self.free_space()
    }

    /// Check `HEADER_SIZE <= lower_ptr <= upper_ptr <= DATA_END` and that the
    /// directory size matches `key_count`.
    pub fn check_pointers(&self) -> Result<()> {
        let lower = self.lower_ptr();
        let upper = self.upper_ptr();
        let key_count = self.key_count();

        let expected_lower = PageHeader::SIZE + key_count as usize * SLOT_SIZE;
        if lower as usize != expected_lower || lower > upper || upper as usize > DATA_END {
            return Err(Error::corruption(
                self.page_id().0,
                CorruptionKind::BadPointers {
                    lower,
                    upper,
                    key_count,
                },
            ));
        }
        Ok(())
    }

    /// Read a slot directory entry.
    pub fn slot(&self, slot: u16) -> Result<SlotEntry> {
        self.check_pointers()?;
        let key_count = self.key_count();
        if slot >= key_count {
            return Err(Error::InvalidSlot { slot, key_count });
        }

        let at = PageHeader::SIZE + slot as usize * SLOT_SIZE;
        Ok(SlotEntry {
            offset: read_u32(self.data(), at),
            length: read_u32(self.data(), at + 4),
        })
    }

    /// Bytes of the record behind `entry`, checked against the record area.
    ///
    /// For a tombstone only the key prefix is still addressable.
    fn record_range(&self, slot: u16, entry: SlotEntry) -> Result<Range<usize>> {
        let start = entry.offset as usize;
        let len = if entry.is_tombstone() {
            KEY_SIZE
        } else {
            entry.length as usize
        };
        let end = start.checked_add(len).unwrap_or(usize::MAX);

        if len < KEY_SIZE || start < self.upper_ptr() as usize || end > DATA_END {
            return Err(Error::corruption(
                self.page_id().0,
                CorruptionKind::SlotOutOfBounds(slot),
            ));
        }
        Ok(start..end)
    }

    pub fn is_tombstone(&self, slot: u16) -> Result<bool> {
        Ok(self.slot(slot)?.is_tombstone())
    }

    /// Key of a slot. Tombstoned slots still report their key.
    pub fn key_at(&self, slot: u16) -> Result<i32> {
        let entry = self.slot(slot)?;
        let range = self.record_range(slot, entry)?;
        Ok(read_u32(self.data(), range.start) as i32)
    }

    /// Payload of a live slot.
    pub fn get(&self, slot: u16) -> Result<&[u8]> {
        let entry = self.slot(slot)?;
        if entry.is_tombstone() {
            return Err(Error::InvalidSlot {
                slot,
                key_count: self.key_count(),
            });
        }
        let range = self.record_range(slot, entry)?;
        Ok(&self.data()[range.start + KEY_SIZE..range.end])
    }

    /// Number of slots that are not tombstones.
    pub fn live_count(&self) -> Result<usize> {
        let mut live = 0;
        for slot in 0..self.key_count() {
            if !self.slot(slot)?.is_tombstone() {
                live += 1;
            }
        }
        Ok(live)
    }

    pub fn tombstone_count(&self) -> Result<usize> {
        Ok(self.key_count() as usize - self.live_count()?)
    }

    /// All live records in key order.
    pub fn records(&self) -> Result<Vec<Record<'_>>> {
        let mut records = Vec::with_capacity(self.key_count() as usize);
        for slot in 0..self.key_count() {
            let entry = self.slot(slot)?;
            if entry.is_tombstone() {
                continue;
            }
            let range = self.record_range(slot, entry)?;
            let data = self.data();
            records.push(Record {
                slot,
                key: read_u32(data, range.start) as i32,
                payload: &data[range.start + KEY_SIZE..range.end],
            });
        }
        Ok(records)
    }

    /// Binary search for the first slot whose key does not satisfy `before`.
    fn partition(&self, before: impl Fn(i32) -> bool) -> Result<u16> {
        let mut lo = 0u16;
        let mut hi = self.key_count();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if before(self.key_at(mid)?) {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Index of the first slot with key `>= key`, or `key_count`.
    pub fn lower_bound(&self, key: i32) -> Result<u16> {
        self.partition(|k| k < key)
    }

    /// Index of the first slot with key `> key`, or `key_count`.
    pub fn upper_bound(&self, key: i32) -> Result<u16> {
        self.partition(|k| k <= key)
    }

    /// First slot whose key is `>= key`.
    ///
    /// Callers check the key at the returned slot for an exact match.
    pub fn search(&self, key: i32) -> Result<Option<u16>> {
        let slot = self.lower_bound(key)?;
        Ok((slot < self.key_count()).then_some(slot))
    }

    /// The special area at the end of the page.
    pub fn special(&self) -> &[u8] {
        &self.data()[DATA_END..]
    }
}

impl<P: DerefMut<Target = Page>> SlottedPage<P> {
    #[inline]
    fn data_mut(&mut self) -> &mut [u8] {
        self.page.as_mut_slice()
    }

    /// Format the page as an empty slotted page.
    ///
    /// Zeroes everything, the special area included.
    pub fn init(&mut self, page_id: PageId, page_type: PageType) {
        self.page.reset();
        let header = PageHeader::new(page_id, page_type, DATA_END as u16);
        self.page.set_header(&header);
    }

    fn set_pointers(&mut self, upper: usize, lower: usize, key_count: usize) {
        let data = self.data_mut();
        write_u16(data, PageHeader::OFFSET_UPPER_PTR, upper as u16);
        write_u16(data, PageHeader::OFFSET_LOWER_PTR, lower as u16);
        write_u16(data, PageHeader::OFFSET_KEY_COUNT, key_count as u16);
    }

    fn write_slot(&mut self, slot: usize, entry: SlotEntry) {
        let at = PageHeader::SIZE + slot * SLOT_SIZE;
        let data = self.data_mut();
        write_u32(data, at, entry.offset);
        write_u32(data, at + 4, entry.length);
    }

    fn set_lsn(&mut self, lsn: u64) {
        let data = self.data_mut();
        data[PageHeader::OFFSET_LSN..PageHeader::OFFSET_LSN + 8].copy_from_slice(&lsn.to_le_bytes());
    }

    /// Record a content change.
    fn bump_lsn(&mut self) {
        let next = self.lsn().saturating_add(1);
        self.set_lsn(next);
    }

    /// Raise the LSN to `lsn`. Lower values are ignored.
    pub fn advance_lsn(&mut self, lsn: u64) {
        if lsn > self.lsn() {
            self.set_lsn(lsn);
        }
    }

    /// Insert a record in key order and return its slot.
    ///
    /// Equal keys are placed before existing ones. Fails with
    /// [`Error::OutOfSpace`] without touching the page when the slot plus the
    /// record do not fit between `lower_ptr` and `upper_ptr`.
    pub fn insert(&mut self, key: i32, payload: &[u8]) -> Result<u16> {
        self.check_pointers()?;

        let record_len = KEY_SIZE + payload.len();
        if !self.can_fit(payload.len()) {
            return Err(Error::OutOfSpace {
                needed: SLOT_SIZE + record_len,
                available: self.free_space(),
            });
        }

        let pos = self.lower_bound(key)? as usize;
        let count = self.key_count() as usize;
        let upper = self.upper_ptr() as usize;
        let lower = self.lower_ptr() as usize;

        let dir_from = PageHeader::SIZE + pos * SLOT_SIZE;
        let dir_to = PageHeader::SIZE + count * SLOT_SIZE;
        let new_upper = upper - record_len;

        let data = self.data_mut();
        data.copy_within(dir_from..dir_to, dir_from + SLOT_SIZE);
        data[new_upper..new_upper + KEY_SIZE].copy_from_slice(&key.to_le_bytes());
        data[new_upper + KEY_SIZE..upper].copy_from_slice(payload);

        self.write_slot(
            pos,
            SlotEntry {
                offset: new_upper as u32,
                length: record_len as u32,
            },
        );
        self.set_pointers(new_upper, lower + SLOT_SIZE, count + 1);
        self.bump_lsn();

        Ok(pos as u16)
    }

    /// Overwrite the payload of a live slot with one of the same length.
    pub fn update(&mut self, slot: u16, payload: &[u8]) -> Result<()> {
        let entry = self.slot(slot)?;
        if entry.is_tombstone() {
            return Err(Error::InvalidSlot {
                slot,
                key_count: self.key_count(),
            });
        }
        let range = self.record_range(slot, entry)?;
        let expected = range.len() - KEY_SIZE;
        if payload.len() != expected {
            return Err(Error::RecordSizeMismatch {
                expected,
                actual: payload.len(),
            });
        }

        self.data_mut()[range.start + KEY_SIZE..range.end].copy_from_slice(payload);
        self.bump_lsn();
        Ok(())
    }

    /// Tombstone a live slot. Its bytes are reclaimed by [`compact`](Self::compact).
    pub fn delete(&mut self, slot: u16) -> Result<()> {
        let entry = self.slot(slot)?;
        if entry.is_tombstone() {
            return Err(Error::InvalidSlot {
                slot,
                key_count: self.key_count(),
            });
        }
        self.record_range(slot, entry)?;

        self.write_slot(
            slot as usize,
            SlotEntry {
                offset: entry.offset,
                length: 0,
            },
        );
        self.bump_lsn();
        Ok(())
    }

    /// Drop tombstones and repack live records downward from `DATA_END` in slot
    /// order. Returns the number of bytes of free space gained.
    ///
    /// A page that is already compact is left untouched, LSN included.
    pub fn compact(&mut self) -> Result<usize> {
        let old_free = self.free_space();

        let records: Vec<(i32, Vec<u8>)> = self
            .records()?
            .into_iter()
            .map(|r| (r.key, r.payload.to_vec()))
            .collect();

        let already_compact = records.len() == self.key_count() as usize && {
            let mut expected = DATA_END;
            let mut packed = true;
            for slot in 0..self.key_count() {
                let entry = self.slot(slot)?;
                expected -= entry.length as usize;
                if entry.offset as usize != expected {
                    packed = false;
                    break;
                }
            }
            packed
        };
        if already_compact {
            return Ok(0);
        }

        let mut upper = DATA_END;
        for (slot, (key, payload)) in records.iter().enumerate() {
            let record_len = KEY_SIZE + payload.len();
            upper -= record_len;

            let data = self.data_mut();
            data[upper..upper + KEY_SIZE].copy_from_slice(&key.to_le_bytes());
            data[upper + KEY_SIZE..upper + record_len].copy_from_slice(payload);

            self.write_slot(
                slot,
                SlotEntry {
                    offset: upper as u32,
                    length: record_len as u32,
                },
            );
        }

        let lower = PageHeader::SIZE + records.len() * SLOT_SIZE;
        self.data_mut()[lower..upper].fill(0);
        self.set_pointers(upper, lower, records.len());
        self.bump_lsn();

        Ok(self.free_space().saturating_sub(old_free))
    }

    /// Remove every record, keeping page identity and the special area.
    pub fn clear(&mut self) {
        self.data_mut()[PageHeader::SIZE..DATA_END].fill(0);
        self.set_pointers(DATA_END, PageHeader::SIZE, 0);
        self.bump_lsn();
    }

    /// Overwrite `bytes` at offset `at` of the special area.
    ///
    /// Counts as a content change, so the LSN moves like any record edit.
    ///
    /// # Panics
    /// Panics if the write runs past the end of the page.
    pub fn write_special(&mut self, at: usize, bytes: &[u8]) {
        let start = DATA_END + at;
        self.data_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        self.bump_lsn();
    }
}
