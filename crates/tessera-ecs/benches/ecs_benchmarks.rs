//! Registry and hierarchy micro-benchmarks.
//!
//! Run with: `cargo bench --bench ecs_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64;

use tessera_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark component types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Velocity {
    dx: f64,
    dy: f64,
}

enum Scene {}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn populated(count: usize) -> (Registry, Vec<Entity>) {
    let mut reg = Registry::new();
    let entities = (0..count)
        .map(|i| {
            let e = reg.create();
            reg.emplace(e, Position { x: i as f64, y: 0.0 });
            if i % 2 == 0 {
                reg.emplace(e, Velocity { dx: 1.0, dy: 0.0 });
            }
            e
        })
        .collect();
    (reg, entities)
}

fn family(count: usize) -> (Registry, Entity, Vec<Entity>) {
    let mut reg = Registry::new();
    let parent = reg.create();
    let kids: Vec<Entity> = (0..count).map(|_| reg.create()).collect();
    for &k in &kids {
        hierarchy::prepend_child::<Scene>(&mut reg, parent, k);
    }
    (reg, parent, kids)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_create_destroy(c: &mut Criterion) {
    c.bench_function("create_destroy_10k", |b| {
        b.iter_batched(
            Registry::new,
            |mut reg| {
                let es: Vec<Entity> = (0..10_000).map(|_| reg.create()).collect();
                for e in es {
                    reg.destroy(e);
                }
                reg
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_view_update(c: &mut Criterion) {
    let (mut reg, _) = populated(10_000);
    c.bench_function("view_mut_velocity_10k", |b| {
        b.iter(|| {
            for (_, vel) in reg.view_mut::<Velocity>() {
                vel.dx = black_box(vel.dx * 0.99);
            }
        });
    });
}

fn bench_random_access(c: &mut Criterion) {
    let (reg, mut entities) = populated(10_000);
    entities.shuffle(&mut Pcg64::seed_from_u64(7));
    c.bench_function("get_position_shuffled_10k", |b| {
        b.iter(|| {
            let mut sum = 0.0;
            for &e in &entities {
                sum += reg.get::<Position>(e).x;
            }
            black_box(sum)
        });
    });
}

fn bench_select(c: &mut Criterion) {
    let (reg, _) = populated(10_000);
    let sel = Selector::new().with::<Position>().with::<Velocity>();
    c.bench_function("select_pos_vel_10k", |b| {
        b.iter(|| black_box(reg.select(&sel).len()));
    });
}

fn bench_prepend(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepend_children");
    for count in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                || {
                    let mut reg = Registry::new();
                    let parent = reg.create();
                    let kids: Vec<Entity> = (0..count).map(|_| reg.create()).collect();
                    (reg, parent, kids)
                },
                |(mut reg, parent, kids)| {
                    for k in kids {
                        hierarchy::prepend_child::<Scene>(&mut reg, parent, k);
                    }
                    reg
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_remove_shuffled(c: &mut Criterion) {
    let mut rng = Pcg64::seed_from_u64(42);
    c.bench_function("remove_from_hierarchy_shuffled_1k", |b| {
        b.iter_batched(
            || {
                let (reg, parent, mut kids) = family(1_000);
                kids.shuffle(&mut rng);
                (reg, parent, kids)
            },
            |(mut reg, parent, kids)| {
                for k in kids {
                    let removed = hierarchy::remove_from_hierarchy::<Scene>(&mut reg, parent, k);
                    black_box(removed);
                }
                reg
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_iterate_children(c: &mut Criterion) {
    let (reg, parent, _) = family(10_000);
    c.bench_function("iterate_children_10k", |b| {
        b.iter(|| black_box(hierarchy::children::<Scene>(&reg, parent).count()));
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_create_destroy,
    bench_view_update,
    bench_random_access,
    bench_select,
    bench_prepend,
    bench_remove_shuffled,
    bench_iterate_children,
);
criterion_main!(benches);
