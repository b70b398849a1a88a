//! # Pool Allocator Benchmark
//!
//! REQUIREMENTS:
//! - alloc/free are O(1) with no heap calls
//! - Lock overhead of the adaptor stays flat
//! - `safe_shrink_size` scales with the free count only
//!
//! Run with: `cargo bench --package addrpool_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use addrpool_core::{
    AddressAllocator, ConcurrencyAdaptor, PoolAddressAllocator, ReservedSpace,
};

const BLOCK_SIZE: u64 = 64;

fn pool(block_count: u64) -> PoolAddressAllocator<u64> {
    let size = block_count * BLOCK_SIZE;
    let reserved = ReservedSpace::for_pool(size, 64, BLOCK_SIZE).unwrap();
    PoolAddressAllocator::new(reserved, None, 64, size, BLOCK_SIZE).unwrap()
}

/// Benchmark: one alloc followed by one free.
fn bench_alloc_free(c: &mut Criterion) {
    let mut pool = pool(1024);
    c.bench_function("pool_alloc_free", |b| {
        b.iter(|| {
            let addr = pool.alloc_addr(black_box(64), 16, 0);
            pool.free_addr(addr, 64);
        });
    });
}

/// Benchmark: drain the pool, then reset it.
fn bench_drain_and_reset(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_and_reset");

    for count in [1_024u64, 16_384, 262_144] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut pool = pool(count);
            b.iter(|| {
                while pool.alloc_addr(64, 1, 0) != u64::MAX {}
                pool.reset();
            });
        });
    }

    group.finish();
}

/// Benchmark: adaptor lock overhead, uncontended.
fn bench_adaptor_alloc_free(c: &mut Criterion) {
    let shared: ConcurrencyAdaptor<_> = ConcurrencyAdaptor::new(pool(1024));
    c.bench_function("adaptor_alloc_free", |b| {
        b.iter(|| {
            let addr = shared.alloc_addr(black_box(64), 16, 0);
            shared.free_addr(addr, 64);
        });
    });
}

/// Benchmark: shrink estimate with half the blocks free.
fn bench_safe_shrink_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("safe_shrink_size");

    for count in [1_024u64, 65_536] {
        let mut pool = pool(count);
        for _ in 0..count / 2 {
            pool.alloc_addr(64, 1, 0);
        }
        group.bench_with_input(BenchmarkId::from_parameter(count), &pool, |b, pool| {
            b.iter(|| black_box(pool.safe_shrink_size(0, 1)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_alloc_free,
    bench_drain_and_reset,
    bench_adaptor_alloc_free,
    bench_safe_shrink_size,
);
criterion_main!(benches);
