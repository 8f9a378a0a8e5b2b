//! Arena tick benchmarks for arena_core.
//!
//! Run with: `cargo bench -p arena_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use arena_core::distance_field::DistanceField;
use arena_core::grid::{Grid, TileCoord};
use arena_core::math::Fixed;
use arena_test_utils::fixtures::{crowded_arena, open_map};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// Full arena ticks with a growing number of agents.
pub fn arena_tick_benchmark(c: &mut Criterion) {
    let dt = Fixed::from_num(0.05);
    let mut group = c.benchmark_group("arena_tick");

    for agents in [8usize, 32, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(agents), &agents, |b, &agents| {
            let mut arena = crowded_arena(agents);
            b.iter(|| black_box(arena.tick(dt)));
        });
    }

    group.finish();
}

/// Distance field rebuilds on open maps.
pub fn distance_field_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_field_build");

    for size in [32u32, 128] {
        let map = open_map(size, size);
        let grid = Grid::from_map(&map);
        let target = TileCoord::new(size as i32 / 2, size as i32 / 2);
        group.bench_with_input(BenchmarkId::from_parameter(size), &target, |b, &target| {
            b.iter(|| black_box(DistanceField::build(&grid, target)));
        });
    }

    group.finish();
}

criterion_group!(benches, arena_tick_benchmark, distance_field_benchmark);
criterion_main!(benches);
