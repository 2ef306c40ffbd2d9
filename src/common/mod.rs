//! Common types shared across pagetree.
//!
//! - Configuration constants and [`config::TreeConfig`]
//! - Error types
//! - Identifiers (PageId, FrameId)

pub mod config;
pub mod error;
mod frame_id;
mod page_id;

pub use error::{CorruptionKind, Error, Result};
pub use frame_id::FrameId;
pub use page_id::PageId;
