//! Tree metadata block.
//!
//! Block 0 of the store records where the tree starts so that a file-backed
//! tree can be reopened:
//!
//! ```text
//! 0   checksum        u32  FNV-1a over bytes 4..4096
//! 4   magic           u32  "BTRE"
//! 8   version         u16
//! 10  reserved        u16
//! 12  order           u32
//! 16  root            u32
//! 20  first_leaf      u32
//! ```

use crate::common::config::MIN_ORDER;
use crate::common::{CorruptionKind, Error, PageId, Result};
use crate::storage::page::{read_u16, read_u32, Page, PageHeader};

/// Magic of the metadata block ("BTRE").
pub const TREE_MAGIC: u32 = 0x4254_5245;

pub const TREE_FORMAT_VERSION: u16 = 1;

const OFFSET_MAGIC: usize = 4;
const OFFSET_VERSION: usize = 8;
const OFFSET_ORDER: usize = 12;
const OFFSET_ROOT: usize = 16;
const OFFSET_FIRST_LEAF: usize = 20;

/// The persisted tree handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeMeta {
    pub order: u32,
    pub root: PageId,
    pub first_leaf: PageId,
}

impl TreeMeta {
    /// Serialize into a checksummed block.
    pub fn encode(&self) -> Page {
        let mut page = Page::new();
        let data = page.as_mut_slice();
        data[OFFSET_MAGIC..OFFSET_MAGIC + 4].copy_from_slice(&TREE_MAGIC.to_le_bytes());
        data[OFFSET_VERSION..OFFSET_VERSION + 2].copy_from_slice(&TREE_FORMAT_VERSION.to_le_bytes());
        data[OFFSET_ORDER..OFFSET_ORDER + 4].copy_from_slice(&self.order.to_le_bytes());
        data[OFFSET_ROOT..OFFSET_ROOT + 4].copy_from_slice(&self.root.0.to_le_bytes());
        data[OFFSET_FIRST_LEAF..OFFSET_FIRST_LEAF + 4]
            .copy_from_slice(&self.first_leaf.0.to_le_bytes());
        page.update_checksum();
        page
    }

    /// Parse a metadata block. `None` for a block that was never written.
    pub fn decode(page: &Page) -> Result<Option<Self>> {
        if page.is_zeroed() {
            return Ok(None);
        }

        let data = page.as_slice();
        let stored = read_u32(data, 0);
        let computed = PageHeader::compute_checksum(data);
        if stored != computed {
            return Err(Error::corruption(
                0,
                CorruptionKind::ChecksumMismatch { stored, computed },
            ));
        }

        let meta = Self {
            order: read_u32(data, OFFSET_ORDER),
            root: PageId::new(read_u32(data, OFFSET_ROOT)),
            first_leaf: PageId::new(read_u32(data, OFFSET_FIRST_LEAF)),
        };

        let well_formed = read_u32(data, OFFSET_MAGIC) == TREE_MAGIC
            && read_u16(data, OFFSET_VERSION) == TREE_FORMAT_VERSION
            && meta.order as usize >= MIN_ORDER
            && meta.root.is_valid()
            && meta.first_leaf.is_valid();
        if !well_formed {
            return Err(Error::corruption(0, CorruptionKind::BadMetadata));
        }

        Ok(Some(meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TreeMeta {
        TreeMeta {
            order: 4,
            root: PageId::new(7),
            first_leaf: PageId::new(1),
        }
    }

    #[test]
    fn test_encode_decode() {
        let page = sample().encode();
        assert_eq!(&page.as_slice()[4..8], &TREE_MAGIC.to_le_bytes());
        assert_eq!(TreeMeta::decode(&page).unwrap(), Some(sample()));
    }

    #[test]
    fn test_zeroed_block_is_absent() {
        assert_eq!(TreeMeta::decode(&Page::new()).unwrap(), None);
    }

    #[test]
    fn test_flipped_byte_detected() {
        let mut page = sample().encode();
        page.as_mut_slice()[OFFSET_ROOT] ^= 0x10;

        assert!(matches!(
            TreeMeta::decode(&page),
            Err(Error::Corruption {
                page_id: 0,
                kind: CorruptionKind::ChecksumMismatch { .. }
            })
        ));
    }

    #[test]
    fn test_bad_order_rejected() {
        let meta = TreeMeta {
            order: 2,
            ..sample()
        };
        assert!(matches!(
            TreeMeta::decode(&meta.encode()),
            Err(Error::Corruption {
                kind: CorruptionKind::BadMetadata,
                ..
            })
        ));
    }
}
