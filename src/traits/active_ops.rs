//! `std::ops` implementations for [`Active<F>`].
//!
//! Each operator records an opcode to the active trace. Operations on
//! constants only are folded without touching the trace.

use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use crate::active::Active;
use crate::float::Float;
use crate::opcode::{self, OpCode};
use crate::trace::{self, Location, Trace, TraceThreadLocal, NO_LOC};

/// Location of an operand, promoting a constant to a `Const` record.
#[inline]
fn ensure_on_trace<F: Float>(x: &Active<F>, t: &mut Trace<F>) -> Location {
    if x.loc == NO_LOC {
        t.push_const(x.value)
    } else {
        x.loc
    }
}

/// Record a binary op, promoting constants as needed.
#[inline]
pub(crate) fn binary_op<F: Float + TraceThreadLocal>(
    lhs: Active<F>,
    rhs: Active<F>,
    op: OpCode,
) -> Active<F> {
    if lhs.loc == NO_LOC && rhs.loc == NO_LOC {
        return Active::constant(opcode::eval_forward(op, lhs.value, rhs.value, F::zero()));
    }
    let (loc, value) = trace::with_active_trace(|t| {
        let x = ensure_on_trace(&lhs, t);
        let y = ensure_on_trace(&rhs, t);
        t.push_binary(op, x, lhs.value, y, rhs.value)
    });
    Active { value, loc }
}

/// Record a unary op with constant operand `coval`.
#[inline]
pub(crate) fn unary_op<F: Float + TraceThreadLocal>(x: Active<F>, op: OpCode, coval: F) -> Active<F> {
    if x.loc == NO_LOC {
        return Active::constant(opcode::eval_forward(op, x.value, F::zero(), coval));
    }
    let (loc, value) = trace::with_active_trace(|t| t.push_unary(op, x.loc, x.value, coval));
    Active { value, loc }
}

// ──────────────────────────────────────────────
//  Active<F> ↔ Active<F> operators
// ──────────────────────────────────────────────

impl<F: Float + TraceThreadLocal> Add for Active<F> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        binary_op(self, rhs, OpCode::Add)
    }
}

impl<F: Float + TraceThreadLocal> Sub for Active<F> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        binary_op(self, rhs, OpCode::Sub)
    }
}

impl<F: Float + TraceThreadLocal> Mul for Active<F> {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        binary_op(self, rhs, OpCode::Mul)
    }
}

impl<F: Float + TraceThreadLocal> Div for Active<F> {
    type Output = Self;
    #[inline]
    fn div(self, rhs: Self) -> Self {
        binary_op(self, rhs, OpCode::Div)
    }
}

impl<F: Float + TraceThreadLocal> Neg for Active<F> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        unary_op(self, OpCode::Neg, F::zero())
    }
}

impl<F: Float + TraceThreadLocal> AddAssign for Active<F> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl<F: Float + TraceThreadLocal> SubAssign for Active<F> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl<F: Float + TraceThreadLocal> MulAssign for Active<F> {
    #[inline]
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl<F: Float + TraceThreadLocal> DivAssign for Active<F> {
    #[inline]
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

// ──────────────────────────────────────────────
//  Mixed ops: Active<F> with primitive floats
// ──────────────────────────────────────────────

// The primitive is promoted to a `Const` record, except `c / x` which has its
// own constant-numerator opcode.
macro_rules! impl_active_scalar_ops {
    ($f:ty) => {
        impl Add<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn add(self, rhs: $f) -> Active<$f> {
                binary_op(self, Active::constant(rhs), OpCode::Add)
            }
        }

        impl Add<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn add(self, rhs: Active<$f>) -> Active<$f> {
                binary_op(Active::constant(self), rhs, OpCode::Add)
            }
        }

        impl Sub<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn sub(self, rhs: $f) -> Active<$f> {
                binary_op(self, Active::constant(rhs), OpCode::Sub)
            }
        }

        impl Sub<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn sub(self, rhs: Active<$f>) -> Active<$f> {
                binary_op(Active::constant(self), rhs, OpCode::Sub)
            }
        }

        impl Mul<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn mul(self, rhs: $f) -> Active<$f> {
                binary_op(self, Active::constant(rhs), OpCode::Mul)
            }
        }

        impl Mul<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn mul(self, rhs: Active<$f>) -> Active<$f> {
                binary_op(Active::constant(self), rhs, OpCode::Mul)
            }
        }

        impl Div<$f> for Active<$f> {
            type Output = Active<$f>;
            #[inline]
            fn div(self, rhs: $f) -> Active<$f> {
                binary_op(self, Active::constant(rhs), OpCode::Div)
            }
        }

        impl Div<Active<$f>> for $f {
            type Output = Active<$f>;
            #[inline]
            fn div(self, rhs: Active<$f>) -> Active<$f> {
                unary_op(rhs, OpCode::ConstDiv, self)
            }
        }

        impl AddAssign<$f> for Active<$f> {
            #[inline]
            fn add_assign(&mut self, rhs: $f) {
                *self = *self + rhs;
            }
        }

        impl SubAssign<$f> for Active<$f> {
            #[inline]
            fn sub_assign(&mut self, rhs: $f) {
                *self = *self - rhs;
            }
        }

        impl MulAssign<$f> for Active<$f> {
            #[inline]
            fn mul_assign(&mut self, rhs: $f) {
                *self = *self * rhs;
            }
        }

        impl DivAssign<$f> for Active<$f> {
            #[inline]
            fn div_assign(&mut self, rhs: $f) {
                *self = *self / rhs;
            }
        }
    };
}

impl_active_scalar_ops!(f32);
impl_active_scalar_ops!(f64);
