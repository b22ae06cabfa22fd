//! Benchmarks for the single-strategy engines' hot CAS-retry path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ratecore::backend::MemoryBackend;
use ratecore::clock::{Clock, SystemClock};
use ratecore::config::{FixedWindowConfig, GcraConfig, LeakyBucketConfig, TokenBucketConfig};
use ratecore::engine::{FixedWindowEngine, GcraEngine, LeakyBucketEngine, TokenBucketEngine};
use ratecore::quota::Quota;
use tokio::runtime::Runtime;

fn bench_engines(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let clock = SystemClock;
    let mut group = c.benchmark_group("engines");

    group.bench_function(BenchmarkId::new("token_bucket", "uncontended"), |b| {
        let backend = MemoryBackend::new();
        let engine = TokenBucketEngine;
        let config = TokenBucketConfig::new(1000, 1000.0).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let key = format!("tb:{}", i % 100);
            rt.block_on(async { black_box(engine.allow(&backend, &clock, None, &key, &config).await) })
        })
    });

    group.bench_function(BenchmarkId::new("leaky_bucket", "uncontended"), |b| {
        let backend = MemoryBackend::new();
        let engine = LeakyBucketEngine;
        let config = LeakyBucketConfig::new(1000, 1000.0).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let key = format!("lb:{}", i % 100);
            rt.block_on(async { black_box(engine.allow(&backend, &clock, None, &key, &config).await) })
        })
    });

    group.bench_function(BenchmarkId::new("gcra", "uncontended"), |b| {
        let backend = MemoryBackend::new();
        let engine = GcraEngine;
        let config = GcraConfig::new(1000, 1000.0).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let key = format!("gcra:{}", i % 100);
            rt.block_on(async { black_box(engine.allow(&backend, &clock, None, &key, &config).await) })
        })
    });

    group.bench_function(BenchmarkId::new("fixed_window", "single_quota"), |b| {
        let backend = MemoryBackend::new();
        let engine = FixedWindowEngine;
        let config = FixedWindowConfig::new(vec![Quota::per_second("default", 1000)]).unwrap();
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let key = format!("fw:{}", i % 100);
            rt.block_on(async { black_box(engine.allow(&backend, &clock, None, &key, &config).await) })
        })
    });

    group.finish();
}

criterion_group!(benches, bench_engines);
criterion_main!(benches);
