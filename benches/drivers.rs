//! Performance benchmarks for the allocation drivers.
//!
//! Run with: `cargo bench --bench drivers`
//!
//! ## Performance Targets
//!
//! | Operation | Target | Notes |
//! |-----------|--------|-------|
//! | Envy-cycle elimination | <10ms at 10×100 | Graph rebuilt after rotations |
//! | Fast envy-cycle elimination | faster than plain | Incremental graph + preference lists |
//! | Graph update | O(n) per pick | Must equal a rebuild |
//! | EFX-preserving search | Linear in workers | Exhaustive tie-break search |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use fairdiv_kernel::checkers::highest_mms_approximation;
use fairdiv_kernel::{
    efx_preserving_parallel, envy_cycle_elimination, fast_envy_cycle_elimination,
    AdditiveGenerator, Allocation, EnvyGraph, Instance,
};

/// Seeded random instance.
fn make_instance(agents: usize, items: usize) -> Instance {
    AdditiveGenerator::default().generate_seeded(agents, items, 7)
}

/// Benchmark plain against fast envy-cycle elimination.
fn bench_envy_cycle_elimination(c: &mut Criterion) {
    let mut group = c.benchmark_group("envy_cycle_elimination");

    for (agents, items) in [(4, 20), (10, 100), (20, 400)] {
        let instance = make_instance(agents, items);
        let label = format!("{agents}x{items}");

        group.throughput(Throughput::Elements(items as u64));
        group.bench_with_input(BenchmarkId::new("plain", &label), &instance, |b, instance| {
            b.iter(|| {
                envy_cycle_elimination(
                    black_box(&instance.agents),
                    &instance.items,
                    Allocation::new(&instance.agents),
                )
            })
        });
        group.bench_with_input(BenchmarkId::new("fast", &label), &instance, |b, instance| {
            b.iter(|| {
                fast_envy_cycle_elimination(
                    black_box(&instance.agents),
                    &instance.items,
                    Allocation::new(&instance.agents),
                )
            })
        });
    }

    group.finish();
}

/// Benchmark incremental graph maintenance against a rebuild.
fn bench_graph_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_update");

    for agents in [5, 20, 50] {
        let instance = make_instance(agents, agents * 4);
        let ids = instance.agents.ids();
        let mut allocation = Allocation::new(&instance.agents);
        for (step, item) in instance.items.iter().enumerate() {
            allocation.allocate(ids[step % ids.len()], item);
        }
        let graph = EnvyGraph::build(&instance.agents, &allocation).unwrap();
        let endowed = ids[0];

        group.bench_with_input(BenchmarkId::new("rebuild", agents), &allocation, |b, allocation| {
            b.iter(|| EnvyGraph::build(black_box(&instance.agents), allocation))
        });
        group.bench_with_input(BenchmarkId::new("incremental", agents), &allocation, |b, allocation| {
            b.iter(|| {
                let mut graph = graph.clone();
                graph.update_after_allocation(black_box(&instance.agents), allocation, endowed)
            })
        });
    }

    group.finish();
}

/// Benchmark the exhaustive tie-break search across worker counts.
fn bench_efx_preserving_workers(c: &mut Criterion) {
    let instance = make_instance(6, 12);
    let mut group = c.benchmark_group("efx_preserving_workers");
    group.sample_size(20);

    for workers in [1, 2, 4] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.iter(|| efx_preserving_parallel(black_box(&instance.agents), &instance.items, None, workers))
        });
    }

    group.finish();
}

/// Benchmark the branch-and-bound maximin share oracle.
fn bench_mms_oracle(c: &mut Criterion) {
    let mut group = c.benchmark_group("mms_oracle");
    group.sample_size(20);

    for items in [8, 12, 16] {
        let instance = make_instance(3, items);
        let allocation =
            envy_cycle_elimination(&instance.agents, &instance.items, Allocation::new(&instance.agents))
                .unwrap();

        group.bench_with_input(BenchmarkId::new("items", items), &allocation, |b, allocation| {
            b.iter(|| highest_mms_approximation(black_box(&instance.agents), &instance.items, allocation))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_envy_cycle_elimination,
    bench_graph_update,
    bench_efx_preserving_workers,
    bench_mms_oracle,
);
criterion_main!(benches);
