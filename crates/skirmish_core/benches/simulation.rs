//! Simulation benchmarks for skirmish_core.
//!
//! Run with: `cargo bench -p skirmish_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use skirmish_core::math::Vec2;
use skirmish_core::spatial::SpatialHashGrid;
use skirmish_test_utils::fixtures::crowded_arena;

const DT: f32 = 1.0 / 60.0;

/// Full tick pipeline over arenas of increasing size.
pub fn simulation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for enemies in [50_usize, 150, 300] {
        group.bench_with_input(BenchmarkId::from_parameter(enemies), &enemies, |b, &n| {
            let mut sim = crowded_arena(n);
            sim.set_movement_intent(Vec2::new(1.0, 0.3));
            b.iter(|| black_box(sim.tick(DT)));
        });
    }
    group.finish();
}

/// Grid rebuild plus one query per body.
pub fn grid_benchmark(c: &mut Criterion) {
    let bodies: Vec<(u64, Vec2, f32)> = (0..500_u64)
        .map(|i| {
            let x = (i % 25) as f32 * 80.0 + 20.0;
            let y = (i / 25) as f32 * 80.0 + 20.0;
            (i, Vec2::new(x, y), 15.0)
        })
        .collect();
    let mut grid = SpatialHashGrid::new(100.0);

    c.bench_function("grid_rebuild_and_query_500", |b| {
        b.iter(|| {
            grid.rebuild(bodies.iter().copied());
            let mut total = 0;
            for &(id, pos, radius) in &bodies {
                total += grid.query(pos, radius, Some(id)).len();
            }
            black_box(total)
        });
    });
}

/// Snapshot capture for a busy arena.
pub fn snapshot_benchmark(c: &mut Criterion) {
    let mut sim = crowded_arena(300);
    sim.tick(DT);
    c.bench_function("snapshot_300", |b| b.iter(|| black_box(sim.snapshot())));
}

criterion_group!(benches, simulation_benchmark, grid_benchmark, snapshot_benchmark);
criterion_main!(benches);
