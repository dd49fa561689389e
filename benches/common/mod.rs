#![allow(dead_code)]

use revtensor::Scalar;

// ─── Rosenbrock ────────────────────────────────────────────────────────────

pub fn rosenbrock<T: Scalar>(x: &[T]) -> T {
    let one = T::from_f64(1.0);
    let hundred = T::from_f64(100.0);
    let mut sum = T::from_f64(0.0);
    for i in 0..x.len() - 1 {
        let t1 = one - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum = sum + t1 * t1 + hundred * t2 * t2;
    }
    sum
}

pub fn rosenbrock_f64(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

// ─── Neural Network Layer ──────────────────────────────────────────────────
// f(x) = Σ_j sigmoid(Σ_i w_ji·x_i + b_j), 4 hidden units
// Deterministic weights: w_ji = sin(j*N+i+1) / (N+1), b_j = 0.1*(j+1)
// Dense higher-order tensors, exercises exp/div.

pub fn nn_layer<T: Scalar>(x: &[T]) -> T {
    let n = x.len();
    let one = T::from_f64(1.0);
    let scale = 1.0 / (n as f64 + 1.0);
    let mut total = T::from_f64(0.0);
    for j in 0..4_usize {
        let mut z = T::from_f64(0.1 * (j as f64 + 1.0));
        for (i, &xi) in x.iter().enumerate() {
            let w = ((j * n + i + 1) as f64).sin() * scale;
            z = z + T::from_f64(w) * xi;
        }
        total = total + one / (one + (-z).exp());
    }
    total
}

// ─── Finite Differences ────────────────────────────────────────────────────

pub fn finite_diff_gradient(f: impl Fn(&[f64]) -> f64, x: &[f64], h: f64) -> Vec<f64> {
    let n = x.len();
    let mut grad = vec![0.0; n];
    for i in 0..n {
        let mut xp = x.to_vec();
        let mut xm = x.to_vec();
        xp[i] += h;
        xm[i] -= h;
        grad[i] = (f(&xp) - f(&xm)) / (2.0 * h);
    }
    grad
}

// ─── Helpers ───────────────────────────────────────────────────────────────

pub fn make_input(n: usize) -> Vec<f64> {
    (0..n).map(|i| 0.5 + 0.01 * i as f64).collect()
}
