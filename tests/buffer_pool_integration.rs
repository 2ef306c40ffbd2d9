//! Integration tests for the buffer pool manager.
//!
//! These tests verify cross-component behavior that unit tests don't cover.

use pagetree::common::PageId;
use pagetree::storage::page::PageType;
use pagetree::storage::DiskManager;
use pagetree::{BufferPoolManager, CorruptionKind, Error};
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");
    let dm = DiskManager::create(&path).unwrap();
    (BufferPoolManager::new(pool_size, dm), dir)
}

/// Allocate a leaf page holding a single record.
fn new_record_page(bpm: &BufferPoolManager, key: i32, payload: &[u8]) -> PageId {
    let mut guard = bpm.new_page().unwrap();
    let page_id = guard.page_id();
    let mut slotted = guard.slotted_mut();
    slotted.init(page_id, PageType::Leaf);
    slotted.insert(key, payload).unwrap();
    page_id
}

fn first_record(bpm: &BufferPoolManager, page_id: PageId) -> (i32, Vec<u8>) {
    let guard = bpm.fetch_page_read(page_id).unwrap();
    let slotted = guard.slotted();
    (slotted.key_at(0).unwrap(), slotted.get(0).unwrap().to_vec())
}

/// Test data persistence across multiple eviction cycles.
#[test]
fn test_data_persistence_across_evictions() {
    let (bpm, _dir) = create_bpm(2);

    // Create 5 pages with unique data (forces evictions)
    let page_ids: Vec<PageId> = (0u8..5)
        .map(|i| new_record_page(&bpm, i as i32, &[i, i.wrapping_mul(3)]))
        .collect();

    // Read all back - verifies evicted pages were flushed and sealed
    for (i, &pid) in page_ids.iter().enumerate() {
        let i = i as u8;
        assert_eq!(first_record(&bpm, pid), (i as i32, vec![i, i.wrapping_mul(3)]));
    }

    let stats = bpm.stats().snapshot();
    assert!(stats.evictions >= 3);
    assert_eq!(stats.corruptions, 0);
}

/// Test flush and reload across BPM instances.
#[test]
fn test_flush_and_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    let pid;

    // First session: create and write
    {
        let dm = DiskManager::create(&path).unwrap();
        let bpm = BufferPoolManager::new(10, dm);

        pid = new_record_page(&bpm, 42, b"persistent!");
        bpm.flush_all_pages().unwrap();
    }

    // Second session: verify data
    {
        let dm = DiskManager::open(&path).unwrap();
        let bpm = BufferPoolManager::new(10, dm);

        assert_eq!(first_record(&bpm, pid), (42, b"persistent!".to_vec()));
    }
}

/// A flipped byte on disk is reported as corruption, not returned as data.
#[test]
fn test_corrupted_block_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    let pid;
    {
        let bpm = BufferPoolManager::new(4, DiskManager::create(&path).unwrap());
        pid = new_record_page(&bpm, 7, b"payload");
        bpm.flush_all_pages().unwrap();
    }

    // Damage one byte of the record area.
    {
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(pid.file_offset() + 4075)).unwrap();
        file.write_all(&[0xAB]).unwrap();
    }

    let bpm = BufferPoolManager::new(4, DiskManager::open(&path).unwrap());
    let err = bpm.fetch_page_read(pid).unwrap_err();
    assert!(matches!(
        err,
        Error::Corruption {
            kind: CorruptionKind::ChecksumMismatch { .. },
            ..
        }
    ));
    assert_eq!(bpm.stats().snapshot().corruptions, 1);
    assert!(bpm.get_pin_count(pid).is_none());
    assert_eq!(bpm.free_frame_count(), 4);
}

/// A block that was written once and later reads back as zeros was lost.
#[test]
fn test_zeroed_block_of_written_page_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("test.db");

    let pid;
    {
        let bpm = BufferPoolManager::new(4, DiskManager::create(&path).unwrap());
        pid = new_record_page(&bpm, 7, b"payload");
        bpm.flush_all_pages().unwrap();
    }

    {
        let mut file = OpenOptions::new().write(true).open(&path).unwrap();
        file.seek(SeekFrom::Start(pid.file_offset())).unwrap();
        file.write_all(&[0u8; 4096]).unwrap();
    }

    let bpm = BufferPoolManager::new(4, DiskManager::open(&path).unwrap());
    assert!(bpm.fetch_page_read(pid).unwrap_err().is_corruption());
    assert_eq!(bpm.stats().snapshot().corruptions, 1);
}

/// A page allocated in this session may still be all zeros.
#[test]
fn test_unformatted_new_page_reloads_after_eviction() {
    let (bpm, _dir) = create_bpm(1);

    let pid = bpm.new_page().unwrap().page_id();
    // Evict it through the only frame.
    let _other = bpm.new_page().unwrap().page_id();

    assert!(bpm.fetch_page_read(pid).unwrap().is_zeroed());
    assert_eq!(bpm.stats().snapshot().corruptions, 0);
}

/// Test concurrent writers to different pages.
#[test]
fn test_concurrent_writers() {
    let (bpm, _dir) = create_bpm(10);
    let bpm = Arc::new(bpm);

    let page_ids: Vec<PageId> = (0..5).map(|i| new_record_page(&bpm, i, &[0])).collect();

    let mut handles = vec![];

    for (i, pid) in page_ids.iter().enumerate() {
        let bpm = Arc::clone(&bpm);
        let pid = *pid;

        handles.push(thread::spawn(move || {
            for j in 0..50 {
                let mut guard = bpm.fetch_page_write(pid).unwrap();
                let value = ((i * 50 + j) % 256) as u8;
                guard.slotted_mut().update(0, &[value]).unwrap();
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }

    // Verify each page has last written value
    for (i, &pid) in page_ids.iter().enumerate() {
        let (_, payload) = first_record(&bpm, pid);
        assert_eq!(payload, vec![((i * 50 + 49) % 256) as u8]);
    }
}

/// Test stats accuracy under load.
#[test]
fn test_stats_accuracy() {
    let (bpm, _dir) = create_bpm(2);

    let pid = new_record_page(&bpm, 1, b"x");

    // Multiple fetches = cache hits
    for _ in 0..5 {
        let _ = bpm.fetch_page_read(pid).unwrap();
    }

    let stats = bpm.stats().snapshot();
    assert!(stats.cache_hits >= 5);

    // Force eviction
    let _ = bpm.new_page().unwrap();
    let _ = bpm.new_page().unwrap();

    let stats = bpm.stats().snapshot();
    assert!(stats.evictions >= 1);
}
