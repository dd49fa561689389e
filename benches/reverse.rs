use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use revtensor::{derivatives, record, Active64, ReverseSweep, SweepConfig};

#[path = "common/mod.rs"]
mod common;
use common::*;

fn bench_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverse_gradient");
    for n in [2, 10, 100] {
        let x = make_input(n);
        let trace = record(|v: &[Active64]| vec![rosenbrock(v)], &x);

        group.bench_with_input(BenchmarkId::new("record", n), &x, |b, x| {
            b.iter(|| black_box(record(|v: &[Active64]| vec![rosenbrock(v)], black_box(x))))
        });

        group.bench_with_input(BenchmarkId::new("sweep", n), &trace, |b, t| {
            b.iter(|| black_box(derivatives(black_box(t), 1).unwrap()))
        });

        group.bench_with_input(BenchmarkId::new("sweep_preaccumulated", n), &trace, |b, t| {
            b.iter(|| {
                let cfg = SweepConfig::default().with_preaccumulation(true);
                black_box(ReverseSweep::new(black_box(t), cfg).unwrap().compute().unwrap())
            })
        });

        group.bench_with_input(BenchmarkId::new("finite_diff", n), &x, |b, x| {
            b.iter(|| black_box(finite_diff_gradient(rosenbrock_f64, x, 1e-7)))
        });
    }
    group.finish();
}

fn bench_higher_order(c: &mut Criterion) {
    let mut group = c.benchmark_group("higher_order");
    for n in [2, 5, 10] {
        let x = make_input(n);
        let trace = record(|v: &[Active64]| vec![nn_layer(v)], &x);
        for order in [2, 3, 4] {
            group.bench_with_input(
                BenchmarkId::new(format!("nn_layer_k{}", order), n),
                &trace,
                |b, t| b.iter(|| black_box(derivatives(black_box(t), order).unwrap())),
            );
        }
    }
    group.finish();
}

criterion_group!(benches, bench_gradient, bench_higher_order);
criterion_main!(benches);
