//! Error types for pagetree.

use thiserror::Error;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a page (or the metadata block) failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CorruptionKind {
    /// Stored checksum disagrees with the recomputed one.
    #[error("checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// Magic number is not the format constant.
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),

    /// The header names a different page than the block it was read from.
    #[error("header names page {0}")]
    PageIdMismatch(u32),

    /// The page type is not one the tree understands.
    #[error("unexpected page type {0}")]
    UnexpectedPageType(u16),

    /// A slot entry points outside the record area.
    #[error("slot {0} points outside the record area")]
    SlotOutOfBounds(u16),

    /// `lower_ptr`/`upper_ptr` violate the header invariant.
    #[error("header pointers out of order (lower {lower}, upper {upper}, key_count {key_count})")]
    BadPointers { lower: u16, upper: u16, key_count: u16 },

    /// Following sibling links arrived back at a page already visited.
    #[error("sibling chain revisits this page")]
    SiblingCycle,

    /// The tree metadata block is missing or malformed.
    #[error("tree metadata block is invalid")]
    BadMetadata,
}

/// All possible errors in pagetree.
///
/// A key that is absent is not an error: lookups return `Option`.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist in the backing store.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Page 0 or another id that can never name a page.
    #[error("Invalid page ID: {0}")]
    InvalidPageId(u32),

    /// Buffer pool has no free frames and cannot evict any pages.
    ///
    /// This happens when all frames are pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// Attempted to delete a page that is still in use.
    #[error("Page {0} is pinned")]
    PagePinned(u32),

    /// A page cannot hold the record being inserted.
    ///
    /// The tree reacts to this by splitting; callers of `insert` never see it.
    #[error("Out of space: need {needed} bytes, {available} available")]
    OutOfSpace { needed: usize, available: usize },

    /// A page failed verification. Fatal for the operation that needed it.
    #[error("Page {page_id} is corrupted: {kind}")]
    Corruption { page_id: u32, kind: CorruptionKind },

    /// Slot index out of range or tombstoned.
    #[error("Invalid slot {slot} (key_count {key_count})")]
    InvalidSlot { slot: u16, key_count: u16 },

    /// In-place update with a payload of a different length.
    #[error("Record size mismatch: slot holds {expected} bytes, got {actual}")]
    RecordSizeMismatch { expected: usize, actual: usize },

    /// The store cannot address another page.
    #[error("Page store full: at most {max_pages} pages")]
    StoreFull { max_pages: u64 },

    /// Tree order below the minimum.
    #[error("Invalid tree order {0}")]
    InvalidOrder(usize),

    /// Any other unusable option.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Shorthand for building a corruption error.
    pub fn corruption(page_id: u32, kind: CorruptionKind) -> Self {
        Error::Corruption { page_id, kind }
    }

    /// True for errors that mean stored data cannot be trusted.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption { .. })
    }
}
