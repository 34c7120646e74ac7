//! Benchmarks for the interpolation hot path.
//!
//! Measures rows-per-second for sampling plus synthesis in memory, and for a
//! full run including shard writes and compilation.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;

use rowfill_core::interpolate;
use rowfill_core::interpolate::plan::InterpolationPlan;
use rowfill_core::interpolate::sampler::RecencySampler;
use rowfill_core::interpolate::synth::Synthesizer;
use rowfill_core::interpolate::uid::{UidAllocator, UidPool};
use rowfill_testutil::{fixture_config, order_dataset};

fn bench_synthesize(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/synthesize");
    let source = order_dataset(1_000);
    let dir = tempfile::tempdir().unwrap();

    for row_count in [1_000, 10_000] {
        group.throughput(Throughput::Elements(row_count as u64));
        group.bench_with_input(BenchmarkId::new("rows", row_count), &row_count, |b, &rows| {
            let config = fixture_config(source.len() + rows, rows, dir.path());
            let plan = InterpolationPlan::from_config(&config).unwrap();
            let sampler = RecencySampler::new(&source).unwrap();

            b.iter(|| {
                let mut pool = UidPool::from_dataset(&source).unwrap();
                let allocator = UidAllocator::new(pool.range().unwrap(), plan.max_uid_retries);
                let synth = Synthesizer::new(&plan, allocator, None);
                let mut rng = StdRng::seed_from_u64(42);
                for _ in 0..rows {
                    let idx = sampler.sample(&mut rng);
                    synth
                        .synthesize(&source.rows[idx], idx, &mut pool, &mut rng)
                        .unwrap();
                }
            });
        });
    }
    group.finish();
}

fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/full_run");
    group.sample_size(10);
    let source = order_dataset(1_000);

    for row_count in [10_000, 50_000] {
        group.throughput(Throughput::Elements(row_count as u64));
        group.bench_with_input(BenchmarkId::new("rows", row_count), &row_count, |b, &rows| {
            let dir = tempfile::tempdir().unwrap();
            let config = fixture_config(rows, 5_000, dir.path());
            b.iter(|| {
                interpolate(&source, &config, None).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_synthesize, bench_full_run);
criterion_main!(benches);
