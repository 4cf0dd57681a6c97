//! Benchmarks for tagmem.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tagmem::{site, BuddyIndexAllocator, MemoryTracker, PagedArray, Pool};

fn bench_tag_alloc(c: &mut Criterion) {
    let tracker = MemoryTracker::new();
    let tag = tracker.create_tag("bench");

    let mut group = c.benchmark_group("tag_allocation");

    group.bench_function("alloc_release_64b", |b| {
        b.iter(|| {
            let ptr = tag.alloc(64, false, site!());
            black_box(ptr);
            tag.release(ptr);
        })
    });

    group.bench_function("alloc_release_64b_align16", |b| {
        b.iter(|| {
            let ptr = tag.alloc(64, true, site!());
            black_box(ptr);
            tag.release(ptr);
        })
    });

    group.finish();
    tracker.destroy_tag(tag, true);
    tracker.shutdown();
}

fn bench_paged_array(c: &mut Criterion) {
    let tracker = MemoryTracker::new();
    let tag = tracker.create_tag("bench");

    let mut group = c.benchmark_group("paged_array");

    let mut array: PagedArray<u64> = PagedArray::new(tag.clone(), 8, site!());
    for value in 0..100_000u64 {
        array.push(value);
    }

    group.bench_function("indexed_scan_100k", |b| {
        b.iter(|| {
            let mut total = 0u64;
            for index in 0..array.len() {
                total = total.wrapping_add(*array.get(index).unwrap());
            }
            black_box(total)
        })
    });

    group.bench_function("piece_slice_scan_100k", |b| {
        b.iter(|| {
            let mut total = 0u64;
            let mut offset = 0;
            while offset < array.len() {
                let piece = array.piece_slice(offset);
                for value in piece {
                    total = total.wrapping_add(*value);
                }
                offset += piece.len();
            }
            black_box(total)
        })
    });

    group.finish();
    drop(array);
    tracker.destroy_tag(tag, true);
    tracker.shutdown();
}

fn bench_pool(c: &mut Criterion) {
    let tracker = MemoryTracker::new();
    let tag = tracker.create_tag("bench");

    let mut group = c.benchmark_group("pool");

    let mut pool: Pool<[u64; 4]> = Pool::new(tag.clone(), 8, site!());

    group.bench_function("insert_remove", |b| {
        b.iter(|| {
            let locator = pool.insert([1, 2, 3, 4]);
            black_box(pool.get(locator));
            pool.remove(locator);
        })
    });

    group.finish();
    drop(pool);
    tracker.destroy_tag(tag, true);
    tracker.shutdown();
}

fn bench_buddy(c: &mut Criterion) {
    let tracker = MemoryTracker::new();
    let tag = tracker.create_tag("bench");

    let mut group = c.benchmark_group("buddy");

    let mut buddy = BuddyIndexAllocator::new(tag.clone(), 16, 4, site!());

    group.bench_function("alloc_release_worst_case_split", |b| {
        b.iter(|| {
            // One smallest block forces a split chain down the whole tree
            // and a merge chain back up.
            let index = buddy.alloc(1);
            black_box(index);
            buddy.release(index);
        })
    });

    group.finish();
    drop(buddy);
    tracker.destroy_tag(tag, true);
    tracker.shutdown();
}

criterion_group!(
    benches,
    bench_tag_alloc,
    bench_paged_array,
    bench_pool,
    bench_buddy
);
criterion_main!(benches);
