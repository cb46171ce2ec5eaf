//! Criterion benchmarks for the Pinworks engine.
//!
//! Two benchmark groups:
//! - `wire_line`: the two-machine wind-and-pull line, stepped from scratch
//! - `hauling_yard`: 40 stockpiles trading material with 10 workers

use criterion::{Criterion, criterion_group, criterion_main};
use pinworks_core::engine::Engine;
use pinworks_core::material::Material;
use pinworks_core::test_utils::*;

// ===========================================================================
// World builders
// ===========================================================================

/// Twenty drawable sources and twenty hungry destinations, each pair wanting
/// a different material from the one next to it.
fn build_hauling_yard() -> Engine {
    let mut engine = Engine::default();
    let materials = [Material::EmptySpindle, Material::SmallBowl, Material::LongWires];
    for i in 0..20 {
        let material = materials[i % materials.len()];
        let source = engine.place_stockpile(i as i32 * 2, 0, 1, 1).unwrap();
        engine.set_stockpile_drawable(source, true).unwrap();
        engine.add_material(source, material, 500).unwrap();

        let sink = engine.place_stockpile(i as i32 * 2, 20, 1, 1).unwrap();
        engine.add_required_material(sink, material, 400).unwrap();
    }
    for _ in 0..10 {
        engine.spawn_worker().unwrap();
    }
    engine
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn wire_line_bench(c: &mut Criterion) {
    c.bench_function("wire_line/100_ticks", |b| {
        b.iter_batched(
            wire_line,
            |mut line| {
                line.engine.advance(100).unwrap();
                line
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn hauling_yard_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("hauling_yard");
    group.bench_function("step", |b| {
        let mut engine = build_hauling_yard();
        b.iter(|| engine.step().unwrap())
    });
    group.finish();
}

criterion_group!(benches, wire_line_bench, hauling_yard_bench);
criterion_main!(benches);
