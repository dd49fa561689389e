//! Derivative-info decoder.
//!
//! Turns one [`OpRecord`] into the dense grid of its partial derivatives
//! `∂ˣᵃ∂ʸᵇ φ` for `1 ≤ a + b ≤ K`. Orders one to three come straight from the
//! record; orders four and up are derived here, highest first, and the base
//! orders are copied last.

use crate::coeff;
use crate::error::{AdError, Result};
use crate::float::Float;
use crate::opcode::OpCode;
use crate::tensor::factorial;
use crate::trace::OpRecord;
use crate::MAX_ORDER;

const N: usize = MAX_ORDER + 1;

/// Partials of one record up to a fixed order, indexed by `(x-order, y-order)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DerivativeInfo<F> {
    order: usize,
    grid: [[F; N]; N],
    unary: bool,
}

impl<F: Float> DerivativeInfo<F> {
    fn zeros(order: usize, unary: bool) -> Self {
        DerivativeInfo {
            order,
            grid: [[F::zero(); N]; N],
            unary,
        }
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// `∂ˣᵃ∂ʸᵇ φ`. Zero outside `1 ≤ a + b ≤ order`.
    #[inline]
    pub fn get(&self, a: usize, b: usize) -> F {
        if a + b == 0 || a + b > self.order {
            return F::zero();
        }
        self.grid[a][b]
    }

    /// True when only the `x` operand carries sensitivity, either because the
    /// op is unary or because both operands were the same location.
    #[inline]
    pub fn is_unary(&self) -> bool {
        self.unary
    }

    /// Fold `φ(x, y)` evaluated at `y = x` into a unary grid:
    /// `∂ⁿ/∂xⁿ φ(x, x) = Σₐ C(n, a) ∂ˣᵃ∂ʸⁿ⁻ᵃ φ`.
    pub fn fold_repeated_operand(&self) -> Self {
        let mut out = DerivativeInfo::zeros(self.order, true);
        for n in 1..=self.order {
            let mut q = F::zero();
            for a in 0..=n {
                let binom = factorial(n) / (factorial(a) * factorial(n - a));
                q = q + F::from_f64_lossy(binom as f64) * self.grid[a][n - a];
            }
            out.grid[n][0] = q;
        }
        out
    }
}

/// Decode `rec` up to `order`.
pub fn decode<F: Float>(rec: &OpRecord<F>, order: usize) -> Result<DerivativeInfo<F>> {
    if order == 0 || order > MAX_ORDER {
        return Err(AdError::InvalidOrder {
            order,
            max: MAX_ORDER,
        });
    }
    let binary = rec.opcode.arity() == 2;
    let mut info = DerivativeInfo::zeros(order, !binary);
    for k in (4..=order).rev() {
        derive_order(rec, k, &mut info.grid);
    }
    copy_base(rec, order, &mut info.grid);

    if binary && rec.x == rec.y {
        return Ok(info.fold_repeated_operand());
    }
    Ok(info)
}

fn copy_base<F: Float>(rec: &OpRecord<F>, order: usize, g: &mut [[F; N]; N]) {
    let p = &rec.partials;
    g[1][0] = p.dx;
    g[0][1] = p.dy;
    if order >= 2 {
        g[2][0] = p.pxx;
        g[1][1] = p.pxy;
        g[0][2] = p.pyy;
    }
    if order >= 3 {
        g[3][0] = p.pxxx;
        g[2][1] = p.pxxy;
        g[1][2] = p.pxyy;
        g[0][3] = p.pyyy;
    }
}

#[inline]
fn lit<F: Float>(v: f64) -> F {
    F::from_f64_lossy(v)
}

/// `(-1)^(k-3)`.
#[inline]
fn alternating<F: Float>(k: usize) -> F {
    if (k - 3) % 2 == 0 {
        F::one()
    } else {
        -F::one()
    }
}

/// Fill the order-`k` partials (`k ≥ 4`) from the record's third-order ones.
fn derive_order<F: Float>(rec: &OpRecord<F>, k: usize, g: &mut [[F; N]; N]) {
    let p = &rec.partials;
    let x = rec.vx;
    let shift = (k - 3) as i32;
    match rec.opcode {
        // pxyy = 2/y³, pyyy = -6x/y⁴: both are powers of 1/y
        OpCode::Div => {
            let yk = rec.vy.powi(shift);
            let s = alternating::<F>(k);
            g[1][k - 1] = s * lit::<F>((factorial(k - 1) / 2) as f64) * p.pxyy / yk;
            g[0][k] = s * lit::<F>((factorial(k) / 6) as f64) * p.pyyy / yk;
        }
        OpCode::ConstDiv => {
            let s = alternating::<F>(k);
            g[k][0] = s * lit::<F>((factorial(k) / 6) as f64) * p.pxxx / x.powi(shift);
        }
        OpCode::Ln => {
            let s = alternating::<F>(k);
            g[k][0] = s * lit::<F>((factorial(k - 1) / 2) as f64) * p.pxxx / x.powi(shift);
        }
        OpCode::Sqrt => {
            let f = (3..k).fold(F::one(), |acc, j| acc * lit::<F>(0.5 - j as f64));
            g[k][0] = f * p.pxxx / x.powi(shift);
        }
        OpCode::PowConst => {
            let f = (3..k).fold(F::one(), |acc, j| acc * (rec.coval - lit::<F>(j as f64)));
            g[k][0] = f * p.pxxx / x.powi(shift);
        }
        OpCode::ConstPow => {
            g[k][0] = rec.coval.ln().powi(shift) * p.pxxx;
        }
        OpCode::Exp => g[k][0] = p.pxxx,
        OpCode::Sin | OpCode::Cos => {
            g[k][0] = match k % 4 {
                0 => -p.pxx,
                1 => p.dx,
                2 => p.pxx,
                _ => p.pxxx,
            };
        }
        OpCode::Asin => g[k][0] = coeff::asin_derivative(k, x),
        OpCode::Acos => g[k][0] = -coeff::asin_derivative(k, x),
        OpCode::Atan => g[k][0] = coeff::atan_derivative(k, x),
        OpCode::Erf => g[k][0] = coeff::erf_derivative(k, x, p.dx),
        // linear or bilinear: nothing above second order
        OpCode::Input
        | OpCode::Const
        | OpCode::Add
        | OpCode::Sub
        | OpCode::Mul
        | OpCode::Neg => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{Trace, NO_LOC};

    fn unary(op: OpCode, x: f64, c: f64) -> OpRecord<f64> {
        let mut t = Trace::new();
        let a = t.push_input(x);
        t.push_unary(op, a, x, c);
        t.records()[1]
    }

    #[test]
    fn order_bounds() {
        let rec = unary(OpCode::Exp, 0.5, 0.0);
        assert!(decode(&rec, 0).is_err());
        assert!(decode(&rec, MAX_ORDER + 1).is_err());
        assert!(decode(&rec, MAX_ORDER).is_ok());
    }

    #[test]
    fn exp_is_closed() {
        let rec = unary(OpCode::Exp, 0.5, 0.0);
        let info = decode(&rec, 6).unwrap();
        for k in 1..=6 {
            assert!((info.get(k, 0) - 0.5_f64.exp()).abs() < 1e-14, "order {}", k);
        }
        assert!(info.is_unary());
        assert_eq!(info.get(0, 1), 0.0);
    }

    #[test]
    fn lower_orders_ignore_requested_order() {
        let rec = unary(OpCode::Ln, 1.7, 0.0);
        let lo = decode(&rec, 2).unwrap();
        let hi = decode(&rec, 6).unwrap();
        assert_eq!(lo.get(1, 0), hi.get(1, 0));
        assert_eq!(lo.get(2, 0), hi.get(2, 0));
        assert_eq!(lo.get(3, 0), 0.0);
    }

    #[test]
    fn square_folds_to_unary() {
        let mut t = Trace::<f64>::new();
        let a = t.push_input(3.0);
        t.push_binary(OpCode::Mul, a, 3.0, a, 3.0);
        let info = decode(&t.records()[1], 3).unwrap();
        assert!(info.is_unary());
        assert_eq!(info.get(1, 0), 6.0);
        assert_eq!(info.get(2, 0), 2.0);
        assert_eq!(info.get(3, 0), 0.0);
        assert_eq!(t.records()[1].y, a);
        assert_ne!(a, NO_LOC);
    }
}
