//! Buffer pool counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the buffer pool.
///
/// Each counter is an independent relaxed atomic; a [`StatsSnapshot`] taken
/// while other threads work is not a consistent cut across counters.
///
/// # Example
/// ```
/// use pagetree::BufferPoolManager;
///
/// let bpm = BufferPoolManager::in_memory(4);
/// let page_id = bpm.new_page().unwrap().page_id();
/// drop(bpm.fetch_page_read(page_id).unwrap());
///
/// let snapshot = bpm.stats().snapshot();
/// assert_eq!(snapshot.pages_allocated, 1);
/// assert_eq!(snapshot.cache_hits, 1);
/// ```
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    evictions: AtomicU64,
    pages_read: AtomicU64,
    pages_written: AtomicU64,
    pages_allocated: AtomicU64,
    corruptions: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self) {
        bump(&self.cache_hits);
    }

    /// A miss is always followed by a read from the store.
    pub(crate) fn record_miss(&self) {
        bump(&self.cache_misses);
        bump(&self.pages_read);
    }

    pub(crate) fn record_eviction(&self) {
        bump(&self.evictions);
    }

    pub(crate) fn record_write(&self) {
        bump(&self.pages_written);
    }

    pub(crate) fn record_allocation(&self) {
        bump(&self.pages_allocated);
    }

    pub(crate) fn record_corruption(&self) {
        bump(&self.corruptions);
    }

    /// Fraction of fetches served from the pool.
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            cache_hits: load(&self.cache_hits),
            cache_misses: load(&self.cache_misses),
            evictions: load(&self.evictions),
            pages_read: load(&self.pages_read),
            pages_written: load(&self.pages_written),
            pages_allocated: load(&self.pages_allocated),
            corruptions: load(&self.corruptions),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.cache_hits,
            &self.cache_misses,
            &self.evictions,
            &self.pages_read,
            &self.pages_written,
            &self.pages_allocated,
            &self.corruptions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Plain copy of the counters at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_allocated: u64,
    /// Loaded blocks that failed checksum, magic or page-id verification.
    pub corruptions: u64,
}

impl StatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Counter growth between `earlier` and `self`.
    ///
    /// Saturates at zero if the pool was reset in between.
    #[must_use]
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.saturating_sub(earlier.cache_hits),
            cache_misses: self.cache_misses.saturating_sub(earlier.cache_misses),
            evictions: self.evictions.saturating_sub(earlier.evictions),
            pages_read: self.pages_read.saturating_sub(earlier.pages_read),
            pages_written: self.pages_written.saturating_sub(earlier.pages_written),
            pages_allocated: self.pages_allocated.saturating_sub(earlier.pages_allocated),
            corruptions: self.corruptions.saturating_sub(earlier.corruptions),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} hit_rate={:.2}% evictions={} reads={} writes={} allocated={} corruptions={}",
            self.cache_hits,
            self.cache_misses,
            self.hit_rate() * 100.0,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.pages_allocated,
            self.corruptions,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zero() {
        let stats = BufferPoolStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_miss_counts_a_read() {
        let stats = BufferPoolStats::new();
        stats.record_miss();
        stats.record_miss();
        stats.record_hit();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_misses, 2);
        assert_eq!(snapshot.pages_read, 2);
        assert!((snapshot.hit_rate() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_since_and_reset() {
        let stats = BufferPoolStats::new();
        stats.record_eviction();
        let before = stats.snapshot();

        stats.record_eviction();
        stats.record_corruption();
        let delta = stats.snapshot().since(&before);
        assert_eq!(delta.evictions, 1);
        assert_eq!(delta.corruptions, 1);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
        assert_eq!(stats.snapshot().since(&before).evictions, 0);
    }

    #[test]
    fn test_display() {
        let stats = BufferPoolStats::new();
        for _ in 0..3 {
            stats.record_hit();
        }
        stats.record_miss();
        stats.record_write();

        let text = stats.snapshot().to_string();
        assert!(text.contains("hits=3"));
        assert!(text.contains("hit_rate=75.00%"));
        assert!(text.contains("writes=1"));
    }
}
