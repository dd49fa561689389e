//! Coefficient tables for higher derivatives of `asin`/`acos`, `atan` and `erf`.
//!
//! `d^i atan(x) = Σ_j Σ_k ATAN[i][j][k] · x^k · (1 + x²)^-j`
//!
//! `d^i asin(x) = Σ_j Σ_k ASIN[i][j][k] · x^k · (1 - x²)^(1/2 - j)`
//!
//! `d^i erf(x)  = Σ_j ERF[i][j] · x^j · erf'(x)`
//!
//! The tables are built once per process on first use.

use std::sync::LazyLock;

use crate::float::Float;
use crate::MAX_ORDER;

const N: usize = MAX_ORDER + 1;

type Table3 = [[[f64; N]; N]; N];

struct InverseTrigTables {
    atan: Table3,
    asin: Table3,
}

static INVERSE_TRIG: LazyLock<InverseTrigTables> = LazyLock::new(|| {
    let mut atan = [[[0.0; N]; N]; N];
    let mut asin = [[[0.0; N]; N]; N];
    atan[1][1][0] = 1.0;
    asin[1][1][0] = 1.0;
    for i in 2..N {
        for j in (2..N).rev() {
            for k in 0..MAX_ORDER {
                atan[i][j][k] = atan[i - 1][j][k + 1] * (k as f64 + 1.0);
                asin[i][j][k] = asin[i - 1][j][k + 1] * (k as f64 + 1.0);
            }
            for k in 1..N {
                atan[i][j][k] += atan[i - 1][j - 1][k - 1] * 2.0 * (1.0 - j as f64);
                asin[i][j][k] += asin[i - 1][j - 1][k - 1] * -2.0 * (1.5 - j as f64);
            }
        }
    }
    InverseTrigTables { atan, asin }
});

static ERF: LazyLock<[[f64; N]; N]> = LazyLock::new(|| {
    let mut c = [[0.0; N]; N];
    c[1][0] = 1.0;
    for i in 2..N {
        for j in 0..i {
            c[i][j] += (j as f64 + 1.0) * c[i - 1][j + 1];
            c[i][j + 1] += -2.0 * c[i - 1][j];
        }
    }
    c
});

fn eval_table<F: Float>(table: &[[f64; N]; N], order: usize, x: F, s0: F, step: F) -> F {
    let mut sum = F::zero();
    let mut s = s0;
    for (i, row) in table.iter().enumerate().take(order + 1) {
        let mut w = F::one();
        for &coef in row.iter().take(i + 1) {
            sum = sum + F::from_f64_lossy(coef) * w * s;
            w = w * x;
        }
        s = s * step;
    }
    sum
}

/// `d^order atan(x) / dx^order`.
pub(crate) fn atan_derivative<F: Float>(order: usize, x: F) -> F {
    debug_assert!((1..=MAX_ORDER).contains(&order));
    let c = F::one() / (F::one() + x * x);
    eval_table(&INVERSE_TRIG.atan[order], order, x, F::one(), c)
}

/// `d^order asin(x) / dx^order`. Negate for `acos`.
pub(crate) fn asin_derivative<F: Float>(order: usize, x: F) -> F {
    debug_assert!((1..=MAX_ORDER).contains(&order));
    let q = F::one() - x * x;
    eval_table(&INVERSE_TRIG.asin[order], order, x, q.sqrt(), F::one() / q)
}

/// `d^order erf(x) / dx^order`, given `dx = erf'(x)`.
pub(crate) fn erf_derivative<F: Float>(order: usize, x: F, dx: F) -> F {
    debug_assert!((1..=MAX_ORDER).contains(&order));
    let mut sum = F::zero();
    let mut w = F::one();
    for &coef in ERF[order].iter().take(order) {
        sum = sum + F::from_f64_lossy(coef) * w * dx;
        w = w * x;
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_orders_match_closed_forms() {
        let x = 0.3_f64;
        let q = 1.0 + x * x;
        assert!((atan_derivative(1, x) - 1.0 / q).abs() < 1e-14);
        assert!((atan_derivative(2, x) + 2.0 * x / (q * q)).abs() < 1e-14);
        assert!((atan_derivative(3, x) - (6.0 * x * x - 2.0) / (q * q * q)).abs() < 1e-13);

        let s = 1.0 - x * x;
        assert!((asin_derivative(1, x) - 1.0 / s.sqrt()).abs() < 1e-14);
        assert!((asin_derivative(2, x) - x / (s * s.sqrt())).abs() < 1e-14);
        assert!((asin_derivative(3, x) - (1.0 + 2.0 * x * x) / (s * s * s.sqrt())).abs() < 1e-13);

        let d = 2.0 / std::f64::consts::PI.sqrt() * (-x * x).exp();
        assert!((erf_derivative(1, x, d) - d).abs() < 1e-14);
        assert!((erf_derivative(2, x, d) + 2.0 * x * d).abs() < 1e-14);
        assert!((erf_derivative(3, x, d) - (4.0 * x * x - 2.0) * d).abs() < 1e-14);
    }

    #[test]
    fn fourth_derivatives() {
        // d⁴ atan = 24x(1 - x²) / (1 + x²)⁴
        let x = 0.7_f64;
        let q = 1.0 + x * x;
        let expected = 24.0 * x * (1.0 - x * x) / q.powi(4);
        assert!((atan_derivative(4, x) - expected).abs() < 1e-12);

        // d⁴ erf = (-8x³ + 12x) erf'
        let d = 2.0 / std::f64::consts::PI.sqrt() * (-x * x).exp();
        let expected = (-8.0 * x * x * x + 12.0 * x) * d;
        assert!((erf_derivative(4, x, d) - expected).abs() < 1e-12);

        // d⁴ asin = (6x³ + 9x) / (1 - x²)^(7/2)
        let s = 1.0 - x * x;
        let expected = (6.0 * x * x * x + 9.0 * x) / s.powf(3.5);
        assert!((asin_derivative(4, x) - expected).abs() < 1e-10);
    }
}
