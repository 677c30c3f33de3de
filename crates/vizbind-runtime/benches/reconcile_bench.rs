//! Benchmarks for table churn and rebuild passes.
//!
//! Run with: cargo bench -p vizbind-runtime --bench reconcile_bench

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use vizbind_core::{DataAdapter, DisplayAxis, IdAllocator, ScalarMapAdapter, ScalarMapping};
use vizbind_harness::RecordingDisplay;
use vizbind_runtime::{DisplayAdapter, EngineConfig, ScalarMapTable, Waker};

// ============================================================================
// Setup helpers
// ============================================================================

/// `n` adapters over `distinct` keys, so `n / distinct` coalesce per key.
fn scalar_pool(ids: &IdAllocator, n: usize, distinct: usize) -> Vec<Arc<ScalarMapAdapter>> {
    (0..n)
        .map(|i| {
            let quantity = format!("q{}", i % distinct.max(1));
            ScalarMapAdapter::new(ids, ScalarMapping::new(quantity.as_str(), DisplayAxis::Rgb))
        })
        .collect()
}

fn manual_adapter() -> (DisplayAdapter, IdAllocator) {
    let ids = IdAllocator::new();
    let adapter = DisplayAdapter::builder()
        .display(RecordingDisplay::new())
        .config(EngineConfig::manual())
        .ids(ids.clone())
        .build()
        .expect("manual adapter");
    (adapter, ids)
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_scalar_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalar_table/accept_remove");
    for &(n, distinct) in &[(16, 16), (256, 16), (256, 256)] {
        let ids = IdAllocator::new();
        let pool = scalar_pool(&ids, n, distinct);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{n}x{distinct}")),
            &pool,
            |b, pool| {
                b.iter(|| {
                    let table = ScalarMapTable::new(Waker::new());
                    for adapter in pool {
                        black_box(table.accept(adapter));
                    }
                    for adapter in pool {
                        table.remove(adapter);
                    }
                    black_box(table.len())
                });
            },
        );
    }
    group.finish();
}

fn bench_rebind(c: &mut Criterion) {
    let ids = IdAllocator::new();
    let pool = scalar_pool(&ids, 64, 8);
    let table = ScalarMapTable::new(Waker::new());
    for adapter in &pool {
        table.accept(adapter);
    }
    let mut flip = false;
    c.bench_function("scalar_table/rebind_controller", |b| {
        b.iter(|| {
            flip = !flip;
            pool[0].rebind(if flip { "other" } else { "q0" });
            black_box(table.len())
        });
    });
}

fn bench_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("updater/pass");
    for &data in &[10usize, 100, 1000] {
        let (adapter, ids) = manual_adapter();
        let _scalars: Vec<_> = (0..8)
            .map(|i| adapter.bind_scalar(ScalarMapping::new(format!("q{i}").as_str(), DisplayAxis::X)))
            .collect();
        let datums: Vec<_> = (0..data)
            .map(|i| DataAdapter::new(&ids, format!("datum-{i}")))
            .collect();
        for datum in &datums {
            adapter.add_data(datum);
        }
        adapter.flush().expect("initial pass");

        group.bench_with_input(BenchmarkId::new("data_only", data), &datums, |b, datums| {
            b.iter(|| {
                datums[0].mark_changed();
                black_box(adapter.flush().expect("pass"))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scalar_churn, bench_rebind, bench_pass);
criterion_main!(benches);
