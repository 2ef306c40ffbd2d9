//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`PageHeader`] - Checksummed metadata at the start of every page
//! - [`SlottedPage`] - Slot directory and record area over a page
//! - [`Fnv1a`] - The page checksum

mod checksum;
#[allow(clippy::module_inception)]
mod page;
mod page_header;
mod slotted_page;

pub use checksum::Fnv1a;
pub use page::Page;
pub use page_header::{PageHeader, PageType, FORMAT_VERSION, PAGE_MAGIC};
pub use slotted_page::{
    capacity, Record, SlotEntry, SlottedPage, DATA_END, KEY_SIZE, MAX_PAYLOAD_SIZE, SLOT_SIZE,
    SPECIAL_SIZE,
};

pub(crate) use page_header::{read_u16, read_u32, write_u32};
