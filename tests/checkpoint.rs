//! Checkpointed derivatives must match the derivatives of the whole loop
//! recorded in one trace, for any checkpoint spacing.

use std::cell::Cell;

use approx::assert_relative_eq;
use revtensor::{
    derivatives, record, Active64, AdError, CheckpointConfig, ConsistencyError, DerivativeTensor,
    IterativeFunc, IterativeProgram, LoopKind, Scalar,
};

struct Growth;

impl IterativeProgram<f64> for Growth {
    fn initial_step<T: Scalar<Float = f64>>(&self, x: &[T]) -> Vec<T> {
        x.to_vec()
    }

    fn iteration_step<T: Scalar<Float = f64>>(&self, t: &[T]) -> Vec<T> {
        let t0 = t[1] + t[0];
        let t1 = t0 * t[1];
        vec![t0, t1]
    }

    fn final_step<T: Scalar<Float = f64>>(&self, t: &[T]) -> Vec<T> {
        vec![t[1] * t[0]]
    }

    fn while_condition(&self, t: &[f64]) -> bool {
        t[0] * t[1] < 10000.0
    }
}

/// Damped rotation with two outputs; exercises transcendental steps.
struct Spiral {
    steps: usize,
}

impl IterativeProgram<f64> for Spiral {
    fn initial_step<T: Scalar<Float = f64>>(&self, x: &[T]) -> Vec<T> {
        vec![x[0] * x[1], x[1].exp(), x[0]]
    }

    fn iteration_step<T: Scalar<Float = f64>>(&self, s: &[T]) -> Vec<T> {
        let h = T::from_f64(0.1);
        vec![
            s[0] + h * s[1].sin() * s[2],
            s[1] - h * s[0].cos(),
            s[2] * T::from_f64(0.95),
        ]
    }

    fn final_step<T: Scalar<Float = f64>>(&self, s: &[T]) -> Vec<T> {
        vec![s[0] * s[1], (s[2] + s[0]).atan()]
    }
}

fn one_shot<P: IterativeProgram<f64>>(
    program: &P,
    x: &[f64],
    iterations: Option<usize>,
    order: usize,
) -> DerivativeTensor<f64> {
    let trace = record(
        |v: &[Active64]| {
            let mut s = program.initial_step(v);
            let mut i = 0;
            loop {
                let values: Vec<f64> = s.iter().map(|a| a.value()).collect();
                let more = match iterations {
                    Some(n) => i < n,
                    None => program.while_condition(&values),
                };
                if !more {
                    break;
                }
                s = program.iteration_step(&s);
                i += 1;
            }
            program.final_step(&s)
        },
        x,
    );
    derivatives(&trace, order).unwrap()
}

fn assert_same(a: &DerivativeTensor<f64>, b: &DerivativeTensor<f64>, tol: f64) {
    assert_eq!(a.order(), b.order());
    assert_eq!(a.num_outputs(), b.num_outputs());
    for (u, v) in a.dependent_values().iter().zip(b.dependent_values()) {
        assert_relative_eq!(*u, *v, max_relative = tol);
    }
    for dep in 0..a.num_outputs() {
        for k in 1..=a.order() {
            let (ia, va) = a.get_values(dep, k);
            let (ib, vb) = b.get_values(dep, k);
            assert_eq!(ia, ib, "dependent {} order {}", dep, k);
            for (p, q) in va.iter().zip(vb) {
                assert_relative_eq!(*p, *q, max_relative = tol);
            }
        }
    }
}

#[test]
fn conditional_loop_matches_one_shot_trace() {
    let x = [2.0, 1.0];
    for order in 1..=3 {
        let expected = one_shot(&Growth, &x, None, order);
        assert_eq!(expected.dependent_values(), &[10368.0]);
        for min_ops in [1, 2, 3, 1000] {
            let mut f = IterativeFunc::new(Growth, LoopKind::Conditional);
            f.set_min_op_per_checkpoint(min_ops);
            let got = f.compute(&x, order).unwrap();
            assert_same(&got, &expected, 1e-10);
            assert_eq!(f.last_stats().unwrap().iterations, 3);
        }
    }
}

#[test]
fn fixed_loop_matches_one_shot_trace() {
    let x = [2.0, 1.0];
    for order in 1..=3 {
        let expected = one_shot(&Growth, &x, Some(3), order);
        for min_ops in [1, 2, 3, 1000] {
            let mut f = IterativeFunc::new(Growth, LoopKind::Fixed(3));
            f.set_min_op_per_checkpoint(min_ops);
            assert_same(&f.compute(&x, order).unwrap(), &expected, 1e-10);
        }
    }
}

#[test]
fn multi_output_program_any_spacing() {
    let x = [0.4, -0.3];
    let program = Spiral { steps: 25 };
    let expected = one_shot(&program, &x, Some(program.steps), 2);
    for min_ops in [1, 7, 40, 100_000] {
        let mut f = IterativeFunc::new(Spiral { steps: 25 }, LoopKind::Fixed(25))
            .with_config(CheckpointConfig::default().with_min_ops_per_checkpoint(min_ops));
        assert_same(&f.compute(&x, 2).unwrap(), &expected, 1e-10);
        let stats = f.last_stats().unwrap();
        assert_eq!(stats.iterations, 25);
        assert!(stats.checkpoints >= 1);
        assert!(stats.checkpoints <= stats.total_ops / min_ops + 1);
    }
    assert_eq!(
        IterativeFunc::new(Spiral { steps: 25 }, LoopKind::Fixed(25))
            .run(&x)
            .unwrap(),
        expected.dependent_values()
    );
}

/// Condition that holds for a fixed number of calls, then never again.
struct Flaky {
    calls: Cell<usize>,
}

impl IterativeProgram<f64> for Flaky {
    fn initial_step<T: Scalar<Float = f64>>(&self, x: &[T]) -> Vec<T> {
        x.to_vec()
    }

    fn iteration_step<T: Scalar<Float = f64>>(&self, s: &[T]) -> Vec<T> {
        vec![s[0] * s[0]]
    }

    fn final_step<T: Scalar<Float = f64>>(&self, s: &[T]) -> Vec<T> {
        s.to_vec()
    }

    fn while_condition(&self, _s: &[f64]) -> bool {
        let n = self.calls.get();
        self.calls.set(n + 1);
        n < 3
    }
}

#[test]
fn non_reproducible_condition_is_detected() {
    let mut f = IterativeFunc::new(
        Flaky {
            calls: Cell::new(0),
        },
        LoopKind::Conditional,
    );
    let err = f.compute(&[1.1], 1).unwrap_err();
    assert_eq!(
        err,
        AdError::Consistency(ConsistencyError::ReplayDiverged { iteration: 1 })
    );
    assert!(f.last_stats().is_none());
}

#[test]
fn invalid_order_is_rejected_before_running() {
    let mut f = IterativeFunc::new(Growth, LoopKind::Conditional);
    assert_eq!(
        f.compute(&[2.0, 1.0], 7).unwrap_err(),
        AdError::InvalidOrder { order: 7, max: 6 }
    );
}
