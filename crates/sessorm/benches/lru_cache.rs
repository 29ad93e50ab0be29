//! Benchmark the session identity cache.
//!
//! The cache uses the generation-counter approach: O(1) touch under a read
//! lock, O(n) eviction scan under the write lock.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sessorm::{IdentityCache, Value, build_key};
use std::sync::Arc;

type Record = Arc<u64>;

fn make_key(i: usize) -> String {
    build_key("orders", &[Value::Int(i as i64), Value::from("eu-west")]).unwrap()
}

fn prefilled(capacity: usize, n: usize) -> IdentityCache<Record> {
    let cache = IdentityCache::new(capacity);
    for i in 0..n {
        cache.put(make_key(i), Arc::new(i as u64));
    }
    cache
}

fn bench_cache_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity_cache/hit");

    for capacity in [50, 256, 1024] {
        let cache = prefilled(capacity, capacity);
        let hit_key = make_key(capacity / 2);
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &hit_key, |b, key| {
            b.iter(|| black_box(cache.get(key)));
        });
    }

    group.finish();
}

fn bench_cache_miss_and_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity_cache/miss_put");

    for capacity in [50, 256, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &cap| {
                let cache = prefilled(cap, cap);
                let mut counter = cap;
                b.iter(|| {
                    counter += 1;
                    cache.put(make_key(counter), Arc::new(counter as u64));
                });
            },
        );
    }

    group.finish();
}

fn bench_cache_mixed_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("identity_cache/mixed");

    for capacity in [50, 256, 1024] {
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &capacity,
            |b, &cap| {
                let prefill = cap * 4 / 5;
                let cache = prefilled(cap, prefill);
                let mut counter = 0usize;
                b.iter(|| {
                    counter += 1;
                    if counter % 5 == 0 {
                        cache.put(make_key(cap + counter), Arc::new(counter as u64));
                    } else {
                        black_box(cache.get(&make_key(counter % prefill)));
                    }
                });
            },
        );
    }

    group.finish();
}

fn bench_build_key(c: &mut Criterion) {
    let index = [Value::Int(42), Value::from("eu-west"), Value::UInt(7)];
    c.bench_function("identity_cache/build_key", |b| {
        b.iter(|| black_box(build_key("orders", &index)));
    });
}

criterion_group!(
    benches,
    bench_cache_hit,
    bench_cache_miss_and_put,
    bench_cache_mixed_workload,
    bench_build_key
);
criterion_main!(benches);
