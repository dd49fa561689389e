use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use revtensor::{IterativeFunc, IterativeProgram, LoopKind, Scalar};

/// Explicit Euler steps of a damped pendulum.
struct Pendulum;

impl IterativeProgram<f64> for Pendulum {
    fn initial_step<T: Scalar<Float = f64>>(&self, x: &[T]) -> Vec<T> {
        vec![x[0], x[1], x[2]]
    }

    fn iteration_step<T: Scalar<Float = f64>>(&self, s: &[T]) -> Vec<T> {
        let h = T::from_f64(0.01);
        let theta = s[0] + h * s[1];
        let omega = s[1] - h * (s[2] * s[0].sin() + T::from_f64(0.1) * s[1]);
        vec![theta, omega, s[2]]
    }

    fn final_step<T: Scalar<Float = f64>>(&self, s: &[T]) -> Vec<T> {
        vec![s[0].cos() * s[1]]
    }
}

fn bench_checkpoint_spacing(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint_spacing");
    let x = [0.3, 0.0, 9.81];
    for min_ops in [10, 100, 1_000, 100_000] {
        group.bench_with_input(BenchmarkId::new("order2_500_steps", min_ops), &min_ops, |b, &m| {
            b.iter(|| {
                let mut f = IterativeFunc::new(Pendulum, LoopKind::Fixed(500));
                f.set_min_op_per_checkpoint(m);
                black_box(f.compute(black_box(&x), 2).unwrap())
            })
        });
    }
    group.bench_function("run_500_steps", |b| {
        let f = IterativeFunc::new(Pendulum, LoopKind::Fixed(500));
        b.iter(|| black_box(f.run(black_box(&x)).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_checkpoint_spacing);
criterion_main!(benches);
