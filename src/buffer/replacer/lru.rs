//! LRU (Least Recently Used) replacement policy.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::common::FrameId;

/// Evicts the unpinned frame whose last access is oldest.
///
/// Every access stamps the frame with a logical clock value. Eviction walks
/// the stamps in ascending order and takes the first evictable frame, so
/// pinned frames are skipped without losing their position.
pub struct LruReplacer {
    /// Logical clock, bumped on every access.
    clock: u64,

    /// Frame -> stamp of its most recent access.
    last_access: HashMap<FrameId, u64>,

    /// Stamp -> frame, oldest first.
    by_age: BTreeMap<u64, FrameId>,

    /// Frames that are currently evictable (pin_count == 0).
    evictable: HashSet<FrameId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self {
            clock: 0,
            last_access: HashMap::new(),
            by_age: BTreeMap::new(),
            evictable: HashSet::new(),
        }
    }

    /// Record that a frame was accessed, making it the most recent.
    pub fn record_access(&mut self, frame_id: FrameId) {
        self.clock += 1;
        if let Some(old) = self.last_access.insert(frame_id, self.clock) {
            self.by_age.remove(&old);
        }
        self.by_age.insert(self.clock, frame_id);
    }

    /// Mark a frame as evictable (pin_count dropped to 0) or pinned.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            if self.last_access.contains_key(&frame_id) {
                self.evictable.insert(frame_id);
            }
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    /// Select and forget the least recently used evictable frame.
    ///
    /// Returns None if every tracked frame is pinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        let (&stamp, &frame_id) = self
            .by_age
            .iter()
            .find(|(_, frame_id)| self.evictable.contains(*frame_id))?;

        self.by_age.remove(&stamp);
        self.last_access.remove(&frame_id);
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    /// Stop tracking a frame. Called when its page is deleted.
    pub fn remove(&mut self, frame_id: FrameId) {
        if let Some(stamp) = self.last_access.remove(&frame_id) {
            self.by_age.remove(&stamp);
        }
        self.evictable.remove(&frame_id);
    }

    /// Number of evictable frames.
    pub fn size(&self) -> usize {
        self.evictable.len()
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replacer_with(frames: &[usize]) -> LruReplacer {
        let mut replacer = LruReplacer::new();
        for &f in frames {
            replacer.record_access(FrameId::new(f));
            replacer.set_evictable(FrameId::new(f), true);
        }
        replacer
    }

    #[test]
    fn test_lru_basic_order() {
        let mut replacer = replacer_with(&[0, 1, 2]);
        assert_eq!(replacer.size(), 3);

        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_lru_reaccess_moves_to_back() {
        let mut replacer = replacer_with(&[0, 1, 2]);

        replacer.record_access(FrameId::new(0));

        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_skips_pinned() {
        let mut replacer = replacer_with(&[0, 1, 2]);
        replacer.set_evictable(FrameId::new(0), false);
        replacer.set_evictable(FrameId::new(2), false);

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);

        // Unpinning keeps the original age.
        replacer.set_evictable(FrameId::new(2), true);
        replacer.set_evictable(FrameId::new(0), true);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_lru_remove() {
        let mut replacer = replacer_with(&[0, 1]);

        replacer.remove(FrameId::new(0));

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_untracked_frame_not_evictable() {
        let mut replacer = LruReplacer::new();
        replacer.set_evictable(FrameId::new(5), true);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }
}
