//! Criterion benchmarks for workspace ticks over coupled networks.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use neurite_bench::coupled_ring;
use neurite_workspace::{SimulationConfig, SimulationContext};

fn bench_ring_8x2k(c: &mut Criterion) {
    let ctx = SimulationContext::new(SimulationConfig::default()).unwrap();
    coupled_ring(&ctx, 8, 2_000).unwrap();
    ctx.tick().unwrap();

    c.bench_function("ring_8x2k_tick", |b| {
        b.iter(|| black_box(ctx.tick().unwrap()));
    });
}

fn bench_empty_tick(c: &mut Criterion) {
    let ctx = SimulationContext::new(SimulationConfig::default()).unwrap();
    c.bench_function("empty_tick", |b| {
        b.iter(|| black_box(ctx.tick().unwrap()));
    });
}

criterion_group!(benches, bench_ring_8x2k, bench_empty_tick);
criterion_main!(benches);
