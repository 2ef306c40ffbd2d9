//! Page header and type definitions.
//!
//! Every page starts with a [`PageHeader`] containing metadata:
//! - FNV-1a checksum and magic number for corruption detection
//! - [`PageType`] discriminator
//! - LSN hook for a future write-ahead log
//! - Slot directory bookkeeping (`upper_ptr`, `lower_ptr`, `key_count`)

use crate::common::{CorruptionKind, PageId};

use super::checksum::Fnv1a;

/// Format tag stored in every page ("PAGE").
pub const PAGE_MAGIC: u32 = 0x5041_4745;

/// Current page format version.
pub const FORMAT_VERSION: u16 = 1;

/// Type of page stored on disk.
///
/// Stored as a little-endian u16 at offset 10.
#[repr(u16)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or unknown page.
    #[default]
    Invalid = 0,
    /// B+-tree internal (routing) node.
    Internal = 1,
    /// B+-tree leaf node.
    Leaf = 2,
}

impl PageType {
    /// Convert from u16, returning Invalid for unknown values.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => PageType::Internal,
            2 => PageType::Leaf,
            _ => PageType::Invalid,
        }
    }
}

#[inline]
pub(crate) fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[inline]
pub(crate) fn read_u64(data: &[u8], offset: usize) -> u64 {
    read_u32(data, offset) as u64 | ((read_u32(data, offset + 4) as u64) << 32)
}

#[inline]
pub(crate) fn write_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub(crate) fn write_u64(data: &mut [u8], offset: usize, value: u64) {
    data[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Metadata stored at the beginning of every page.
///
/// # Layout (30 bytes, all little-endian)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     checksum  (FNV-1a over bytes 4..PAGE_SIZE)
/// 4       4     magic     (PAGE_MAGIC)
/// 8       2     version
/// 10      2     page_type
/// 12      8     lsn
/// 20      4     page_id
/// 24      2     upper_ptr (start of the record area)
/// 26      2     lower_ptr (end of the slot directory)
/// 28      2     key_count (slots, tombstones included)
/// ```
///
/// # Checksum
/// The checksum field comes first so it can be skipped with a single slice:
/// the hash covers every other byte of the page, header and body alike.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    /// FNV-1a checksum of the page contents.
    pub checksum: u32,
    /// Format tag, [`PAGE_MAGIC`] for a valid page.
    pub magic: u32,
    /// Format version.
    pub version: u16,
    /// Type of this page.
    pub page_type: PageType,
    /// Log Sequence Number of the last modification. Never decreases.
    pub lsn: u64,
    /// Id of the page this header belongs to.
    pub page_id: PageId,
    /// Offset where the record area begins.
    pub upper_ptr: u16,
    /// Offset where the slot directory ends.
    pub lower_ptr: u16,
    /// Number of slots, live or tombstoned.
    pub key_count: u16,
}

impl PageHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 30;

    pub const OFFSET_CHECKSUM: usize = 0;
    pub const OFFSET_MAGIC: usize = 4;
    pub const OFFSET_VERSION: usize = 8;
    pub const OFFSET_PAGE_TYPE: usize = 10;
    pub const OFFSET_LSN: usize = 12;
    pub const OFFSET_PAGE_ID: usize = 20;
    pub const OFFSET_UPPER_PTR: usize = 24;
    pub const OFFSET_LOWER_PTR: usize = 26;
    pub const OFFSET_KEY_COUNT: usize = 28;

    /// Create a header for an empty page whose record area ends at `data_end`.
    pub fn new(page_id: PageId, page_type: PageType, data_end: u16) -> Self {
        Self {
            checksum: 0,
            magic: PAGE_MAGIC,
            version: FORMAT_VERSION,
            page_type,
            lsn: 0,
            page_id,
            upper_ptr: data_end,
            lower_ptr: Self::SIZE as u16,
            key_count: 0,
        }
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        Self {
            checksum: read_u32(data, Self::OFFSET_CHECKSUM),
            magic: read_u32(data, Self::OFFSET_MAGIC),
            version: read_u16(data, Self::OFFSET_VERSION),
            page_type: PageType::from_u16(read_u16(data, Self::OFFSET_PAGE_TYPE)),
            lsn: read_u64(data, Self::OFFSET_LSN),
            page_id: PageId::new(read_u32(data, Self::OFFSET_PAGE_ID)),
            upper_ptr: read_u16(data, Self::OFFSET_UPPER_PTR),
            lower_ptr: read_u16(data, Self::OFFSET_LOWER_PTR),
            key_count: read_u16(data, Self::OFFSET_KEY_COUNT),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < PageHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for PageHeader");

        write_u32(data, Self::OFFSET_CHECKSUM, self.checksum);
        write_u32(data, Self::OFFSET_MAGIC, self.magic);
        write_u16(data, Self::OFFSET_VERSION, self.version);
        write_u16(data, Self::OFFSET_PAGE_TYPE, self.page_type as u16);
        write_u64(data, Self::OFFSET_LSN, self.lsn);
        write_u32(data, Self::OFFSET_PAGE_ID, self.page_id.0);
        write_u16(data, Self::OFFSET_UPPER_PTR, self.upper_ptr);
        write_u16(data, Self::OFFSET_LOWER_PTR, self.lower_ptr);
        write_u16(data, Self::OFFSET_KEY_COUNT, self.key_count);
    }

    /// Serialize into a standalone buffer.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        self.write_to(&mut buf);
        buf
    }

    /// Check the magic number.
    #[inline]
    pub fn has_valid_magic(&self) -> bool {
        self.magic == PAGE_MAGIC
    }

    /// Compute the checksum of a page.
    ///
    /// Covers every byte after the checksum field.
    pub fn compute_checksum(page_data: &[u8]) -> u32 {
        let mut hasher = Fnv1a::new();
        hasher.update(&page_data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Compute the checksum and store it in bytes 0..4.
    pub fn finalize_checksum(page_data: &mut [u8]) {
        let checksum = Self::compute_checksum(page_data);
        write_u32(page_data, Self::OFFSET_CHECKSUM, checksum);
    }

    /// Check checksum and magic, reporting which one failed.
    pub fn validate(page_data: &[u8]) -> std::result::Result<(), CorruptionKind> {
        let stored = read_u32(page_data, Self::OFFSET_CHECKSUM);
        let computed = Self::compute_checksum(page_data);
        if stored != computed {
            return Err(CorruptionKind::ChecksumMismatch { stored, computed });
        }

        let magic = read_u32(page_data, Self::OFFSET_MAGIC);
        if magic != PAGE_MAGIC {
            return Err(CorruptionKind::BadMagic(magic));
        }

        Ok(())
    }

    /// `true` if the page passes checksum and magic verification.
    pub fn verify(page_data: &[u8]) -> bool {
        Self::validate(page_data).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::PAGE_SIZE;

    fn sample_header() -> PageHeader {
        PageHeader {
            checksum: 0xDEAD_BEEF,
            magic: PAGE_MAGIC,
            version: FORMAT_VERSION,
            page_type: PageType::Leaf,
            lsn: 0x1234_5678_9ABC_DEF0,
            page_id: PageId::new(77),
            upper_ptr: 4000,
            lower_ptr: 46,
            key_count: 2,
        }
    }

    #[test]
    fn test_page_type_from_u16() {
        assert_eq!(PageType::from_u16(0), PageType::Invalid);
        assert_eq!(PageType::from_u16(1), PageType::Internal);
        assert_eq!(PageType::from_u16(2), PageType::Leaf);
        assert_eq!(PageType::from_u16(0xFFFF), PageType::Invalid);
    }

    #[test]
    fn test_page_header_new() {
        let header = PageHeader::new(PageId::new(5), PageType::Internal, 4080);
        assert!(header.has_valid_magic());
        assert_eq!(header.version, FORMAT_VERSION);
        assert_eq!(header.lower_ptr as usize, PageHeader::SIZE);
        assert_eq!(header.upper_ptr, 4080);
        assert_eq!(header.key_count, 0);
        assert_eq!(header.lsn, 0);
    }

    #[test]
    fn test_page_header_roundtrip() {
        let original = sample_header();
        let recovered = PageHeader::from_bytes(&original.to_bytes());
        assert_eq!(original, recovered);
    }

    #[test]
    fn test_page_header_byte_layout() {
        let bytes = sample_header().to_bytes();

        assert_eq!(&bytes[0..4], &0xDEAD_BEEFu32.to_le_bytes());
        assert_eq!(&bytes[4..8], &[0x45, 0x47, 0x41, 0x50]); // "PAGE" little-endian
        assert_eq!(&bytes[8..10], &[1, 0]);
        assert_eq!(&bytes[10..12], &[2, 0]); // Leaf
        assert_eq!(bytes[12], 0xF0); // lsn LSB
        assert_eq!(bytes[19], 0x12); // lsn MSB
        assert_eq!(&bytes[20..24], &[77, 0, 0, 0]);
        assert_eq!(&bytes[24..26], &4000u16.to_le_bytes());
        assert_eq!(&bytes[26..28], &[46, 0]);
        assert_eq!(&bytes[28..30], &[2, 0]);
    }

    #[test]
    fn test_checksum_skips_checksum_field() {
        let mut page = [0u8; PAGE_SIZE];
        page[100] = 0xAB;

        let checksum1 = PageHeader::compute_checksum(&page);
        page[..4].copy_from_slice(&[0xFF; 4]);
        let checksum2 = PageHeader::compute_checksum(&page);

        assert_eq!(checksum1, checksum2);
        assert_eq!(checksum1, Fnv1a::checksum(&page[4..]));
    }

    #[test]
    fn test_verify_after_finalize() {
        let mut page = [0u8; PAGE_SIZE];
        sample_header().write_to(&mut page);
        page[2000] = 0x5A;

        assert!(!PageHeader::verify(&page));
        PageHeader::finalize_checksum(&mut page);
        assert!(PageHeader::verify(&page));
    }

    #[test]
    fn test_any_flipped_byte_fails_verification() {
        let mut page = [0u8; PAGE_SIZE];
        sample_header().write_to(&mut page);
        PageHeader::finalize_checksum(&mut page);

        for offset in [4, 9, 12, 29, 30, 1000, 4079, 4095] {
            let mut corrupted = page;
            corrupted[offset] ^= 0x01;
            assert!(
                !PageHeader::verify(&corrupted),
                "flip at offset {} went unnoticed",
                offset
            );
        }
    }

    #[test]
    fn test_validate_reports_bad_magic() {
        let mut page = [0u8; PAGE_SIZE];
        let mut header = sample_header();
        header.magic = 0x1234_5678;
        header.write_to(&mut page);
        PageHeader::finalize_checksum(&mut page);

        assert_eq!(
            PageHeader::validate(&page),
            Err(CorruptionKind::BadMagic(0x1234_5678))
        );
    }

    #[test]
    fn test_validate_reports_checksum_mismatch() {
        let mut page = [0u8; PAGE_SIZE];
        sample_header().write_to(&mut page);
        PageHeader::finalize_checksum(&mut page);
        page[500] = 1;

        assert!(matches!(
            PageHeader::validate(&page),
            Err(CorruptionKind::ChecksumMismatch { .. })
        ));
    }
}
