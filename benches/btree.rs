//! B+-tree benchmarks: inserts, point lookups and range scans.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pagetree::{BPlusTree, TreeConfig};
use tempfile::tempdir;

/// Deterministic permutation of `0..count`.
fn scrambled(count: i32) -> Vec<i32> {
    // 7919 is coprime to every count used here.
    (0..count).map(|i| (i * 7919) % count).collect()
}

fn filled_tree(count: i32, order: usize) -> BPlusTree {
    let config = TreeConfig::default().with_order(order).with_pool_size(256);
    let mut tree = BPlusTree::in_memory(config).unwrap();
    for key in scrambled(count) {
        tree.insert(key, key).unwrap();
    }
    tree
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_insert");

    for count in [1_000, 10_000] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("sequential", count), &count, |b, &count| {
            b.iter(|| {
                let mut tree =
                    BPlusTree::in_memory(TreeConfig::default().with_pool_size(256)).unwrap();
                for key in 0..count {
                    tree.insert(key, key).unwrap();
                }
                tree
            });
        });

        group.bench_with_input(BenchmarkId::new("scrambled", count), &count, |b, &count| {
            let keys = scrambled(count);
            b.iter(|| {
                let mut tree =
                    BPlusTree::in_memory(TreeConfig::default().with_pool_size(256)).unwrap();
                for &key in &keys {
                    tree.insert(key, key).unwrap();
                }
                tree
            });
        });

        group.bench_with_input(BenchmarkId::new("file", count), &count, |b, &count| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let path = dir.path().join("bench.db");
                    (dir, path)
                },
                |(dir, path)| {
                    let config = TreeConfig::default().with_pool_size(64);
                    let mut tree = BPlusTree::create_file(&path, config).unwrap();
                    for key in 0..count {
                        tree.insert(key, key).unwrap();
                    }
                    tree.flush().unwrap();
                    dir
                },
            );
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_search");

    for order in [4, 32, 128] {
        let count = 10_000;
        let tree = filled_tree(count, order);

        group.bench_with_input(BenchmarkId::new("hit", order), &order, |b, _| {
            let mut key = 0;
            b.iter(|| {
                key = (key + 7919) % count;
                black_box(tree.search(black_box(key)).unwrap())
            });
        });

        group.bench_with_input(BenchmarkId::new("miss", order), &order, |b, _| {
            b.iter(|| black_box(tree.search(black_box(count + 1)).unwrap()));
        });
    }

    group.finish();
}

fn bench_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_range");
    let tree = filled_tree(10_000, 128);

    for width in [10, 100, 1_000] {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| black_box(tree.range_query(5_000, 5_000 + width - 1).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_search, bench_range);
criterion_main!(benches);
