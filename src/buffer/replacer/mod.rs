//! Eviction policy implementations (replacers).
//!
//! - [`LruReplacer`] - Least recently used unpinned frame goes first

mod lru;

pub use lru::LruReplacer;
