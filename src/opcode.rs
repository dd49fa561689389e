//! Elementary operation codes recorded on a [`Trace`](crate::Trace).
//!
//! [`eval_forward`] evaluates a single opcode and [`local_partials`] produces
//! its partial derivatives up to third order, which is all the recording
//! front end guarantees. Orders four to six are derived later by the
//! [decoder](crate::decode).

use crate::float::Float;
use crate::trace::LocalPartials;

/// Elementary operation codes.
///
/// Binary ops use both operand slots of a record. Unary ops use `x` only.
/// The `Const*` / `*Const` variants carry their constant operand in the
/// record's `coval` field instead of an operand location.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OpCode {
    // ── Structural ──
    /// Independent variable (leaf).
    Input,
    /// Constant promoted onto the trace because it met an active operand.
    Const,

    // ── Binary arithmetic ──
    Add,
    Sub,
    Mul,
    Div,

    // ── Unary ──
    Neg,
    /// `coval / x`.
    ConstDiv,
    /// `x ^ coval`.
    PowConst,
    /// `coval ^ x`.
    ConstPow,
    Sqrt,
    Exp,
    Ln,

    // ── Trig ──
    Sin,
    Cos,
    Asin,
    Acos,
    Atan,

    // ── Special ──
    Erf,
}

impl OpCode {
    /// Number of operand locations the opcode reads.
    #[inline]
    pub fn arity(self) -> usize {
        match self {
            OpCode::Input | OpCode::Const => 0,
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div => 2,
            _ => 1,
        }
    }

    /// Whether a preaccumulation run may continue through this opcode.
    ///
    /// Independents end a run: nothing upstream of them can be collapsed.
    #[inline]
    pub fn is_collapsible(self) -> bool {
        !matches!(self, OpCode::Input)
    }
}

#[inline]
fn lit<F: Float>(v: f64) -> F {
    F::from_f64_lossy(v)
}

/// Evaluate a single opcode.
///
/// `a`, `b` are the operand values (`b` is ignored for unary ops) and `c` is
/// the record's constant operand.
#[inline]
pub fn eval_forward<F: Float>(op: OpCode, a: F, b: F, c: F) -> F {
    match op {
        // values are set when the leaf is created
        OpCode::Input | OpCode::Const => a,

        OpCode::Add => a + b,
        OpCode::Sub => a - b,
        OpCode::Mul => a * b,
        OpCode::Div => a / b,

        OpCode::Neg => -a,
        OpCode::ConstDiv => c / a,
        OpCode::PowConst => a.powf(c),
        OpCode::ConstPow => c.powf(a),
        OpCode::Sqrt => a.sqrt(),
        OpCode::Exp => a.exp(),
        OpCode::Ln => a.ln(),

        OpCode::Sin => a.sin(),
        OpCode::Cos => a.cos(),
        OpCode::Asin => a.asin(),
        OpCode::Acos => a.acos(),
        OpCode::Atan => a.atan(),

        OpCode::Erf => Float::erf(a),
    }
}

/// Partial derivatives of one opcode up to third order.
///
/// `a`, `b` are the operand values, `c` the constant operand and `r` the
/// result value. Pure-`y` and mixed partials are zero for unary ops.
pub fn local_partials<F: Float>(op: OpCode, a: F, b: F, c: F, r: F) -> LocalPartials<F> {
    let zero = F::zero();
    let one = F::one();
    let two = lit::<F>(2.0);
    let mut p = LocalPartials::default();

    match op {
        OpCode::Input | OpCode::Const => {}

        OpCode::Add => {
            p.dx = one;
            p.dy = one;
        }
        OpCode::Sub => {
            p.dx = one;
            p.dy = -one;
        }
        OpCode::Mul => {
            p.dx = b;
            p.dy = a;
            p.pxy = one;
        }
        OpCode::Div => {
            let inv = one / b;
            let inv2 = inv * inv;
            p.dx = inv;
            p.dy = -a * inv2;
            p.pxy = -inv2;
            p.pyy = two * a * inv2 * inv;
            p.pxyy = two * inv2 * inv;
            p.pyyy = lit::<F>(-6.0) * a * inv2 * inv2;
        }

        OpCode::Neg => p.dx = -one,
        OpCode::ConstDiv => {
            let inv = one / a;
            let inv2 = inv * inv;
            p.dx = -c * inv2;
            p.pxx = two * c * inv2 * inv;
            p.pxxx = lit::<F>(-6.0) * c * inv2 * inv2;
        }
        OpCode::PowConst => {
            p.dx = c * a.powf(c - one);
            p.pxx = c * (c - one) * a.powf(c - two);
            p.pxxx = c * (c - one) * (c - two) * a.powf(c - lit::<F>(3.0));
        }
        OpCode::ConstPow => {
            let l = c.ln();
            p.dx = l * r;
            p.pxx = l * l * r;
            p.pxxx = l * l * l * r;
        }
        OpCode::Sqrt => {
            p.dx = lit::<F>(0.5) / r;
            p.pxx = lit::<F>(-0.25) / (a * r);
            p.pxxx = lit::<F>(0.375) / (a * a * r);
        }
        OpCode::Exp => {
            p.dx = r;
            p.pxx = r;
            p.pxxx = r;
        }
        OpCode::Ln => {
            let inv = one / a;
            p.dx = inv;
            p.pxx = -inv * inv;
            p.pxxx = two * inv * inv * inv;
        }

        OpCode::Sin => {
            let (s, co) = a.sin_cos();
            p.dx = co;
            p.pxx = -s;
            p.pxxx = -co;
        }
        OpCode::Cos => {
            let (s, co) = a.sin_cos();
            p.dx = -s;
            p.pxx = -co;
            p.pxxx = s;
        }
        OpCode::Asin | OpCode::Acos => {
            let s = one - a * a;
            let rs = s.sqrt();
            let sign = if op == OpCode::Asin { one } else { -one };
            p.dx = sign / rs;
            p.pxx = sign * a / (s * rs);
            p.pxxx = sign * (one + two * a * a) / (s * s * rs);
        }
        OpCode::Atan => {
            let q = one / (one + a * a);
            p.dx = q;
            p.pxx = -two * a * q * q;
            p.pxxx = (lit::<F>(6.0) * a * a - two) * q * q * q;
        }

        OpCode::Erf => {
            let d = two / F::PI().sqrt() * (-a * a).exp();
            p.dx = d;
            p.pxx = -two * a * d;
            p.pxxx = (lit::<F>(4.0) * a * a - two) * d;
        }
    }

    // unary partials never leak into the y slots
    if op.arity() < 2 {
        p.dy = zero;
        p.pxy = zero;
        p.pyy = zero;
        p.pxxy = zero;
        p.pxyy = zero;
        p.pyyy = zero;
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fd3<F: Fn(f64) -> f64>(f: F, x: f64) -> (f64, f64, f64) {
        let h = 1e-3;
        let d1 = (f(x + h) - f(x - h)) / (2.0 * h);
        let d2 = (f(x + h) - 2.0 * f(x) + f(x - h)) / (h * h);
        let d3 = (f(x + 2.0 * h) - 2.0 * f(x + h) + 2.0 * f(x - h) - f(x - 2.0 * h)) / (2.0 * h * h * h);
        (d1, d2, d3)
    }

    fn check_unary(op: OpCode, c: f64, x: f64) {
        let r = eval_forward(op, x, 0.0, c);
        let p = local_partials(op, x, 0.0, c, r);
        let (d1, d2, d3) = fd3(|t| eval_forward(op, t, 0.0, c), x);
        assert!((p.dx - d1).abs() < 1e-5, "{:?} dx: {} vs {}", op, p.dx, d1);
        assert!((p.pxx - d2).abs() < 1e-4, "{:?} pxx: {} vs {}", op, p.pxx, d2);
        assert!((p.pxxx - d3).abs() < 1e-3, "{:?} pxxx: {} vs {}", op, p.pxxx, d3);
    }

    #[test]
    fn unary_partials_match_finite_differences() {
        for op in [
            OpCode::Neg,
            OpCode::Sqrt,
            OpCode::Exp,
            OpCode::Ln,
            OpCode::Sin,
            OpCode::Cos,
            OpCode::Asin,
            OpCode::Acos,
            OpCode::Atan,
            OpCode::Erf,
        ] {
            check_unary(op, 0.0, 0.4);
        }
        check_unary(OpCode::ConstDiv, 3.0, 1.3);
        check_unary(OpCode::PowConst, 2.5, 1.3);
        check_unary(OpCode::ConstPow, 1.7, 0.8);
    }

    #[test]
    fn div_partials() {
        let (a, b) = (3.0_f64, 2.0_f64);
        let p = local_partials(OpCode::Div, a, b, 0.0, a / b);
        assert_eq!(p.dx, 0.5);
        assert_eq!(p.dy, -0.75);
        assert_eq!(p.pxx, 0.0);
        assert_eq!(p.pxy, -0.25);
        assert_eq!(p.pyy, 0.75);
        assert_eq!(p.pxyy, 0.25);
        assert_eq!(p.pyyy, -1.125);
    }

    #[test]
    fn arity_and_collapsible() {
        assert_eq!(OpCode::Input.arity(), 0);
        assert_eq!(OpCode::Mul.arity(), 2);
        assert_eq!(OpCode::Erf.arity(), 1);
        assert!(!OpCode::Input.is_collapsible());
        assert!(OpCode::Const.is_collapsible());
    }
}
