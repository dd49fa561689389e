//! Active variable recorded on a [`Trace`](crate::Trace).
//!
//! Arithmetic on [`Active<F>`] appends records to the thread-local trace made
//! current by [`record`](crate::record). Constants carry [`NO_LOC`] and stay
//! off the trace until they meet an active operand.

use std::fmt::{self, Display};

use crate::float::Float;
use crate::opcode::OpCode;
use crate::trace::{Location, TraceThreadLocal, NO_LOC};
use crate::traits::active_ops::unary_op;

/// Active variable: value plus trace location. `Copy`, 8 bytes for `f32`.
#[derive(Clone, Copy, Debug)]
pub struct Active<F: Float> {
    pub(crate) value: F,
    pub(crate) loc: Location,
}

impl<F: Float> Active<F> {
    /// Create a constant (not on the trace).
    #[inline]
    pub fn constant(value: F) -> Self {
        Active { value, loc: NO_LOC }
    }

    /// Wrap an existing trace location (internal use).
    #[inline]
    pub fn from_trace(value: F, loc: Location) -> Self {
        Active { value, loc }
    }

    #[inline]
    pub fn value(&self) -> F {
        self.value
    }

    /// Trace location, or [`NO_LOC`] for constants.
    #[inline]
    pub fn location(&self) -> Location {
        self.loc
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.loc == NO_LOC
    }
}

impl<F: Float + TraceThreadLocal> Active<F> {
    pub fn sqrt(self) -> Self {
        unary_op(self, OpCode::Sqrt, F::zero())
    }

    pub fn exp(self) -> Self {
        unary_op(self, OpCode::Exp, F::zero())
    }

    pub fn ln(self) -> Self {
        unary_op(self, OpCode::Ln, F::zero())
    }

    pub fn sin(self) -> Self {
        unary_op(self, OpCode::Sin, F::zero())
    }

    pub fn cos(self) -> Self {
        unary_op(self, OpCode::Cos, F::zero())
    }

    /// Recorded as `sin(x) / cos(x)`.
    pub fn tan(self) -> Self {
        self.sin() / self.cos()
    }

    pub fn asin(self) -> Self {
        unary_op(self, OpCode::Asin, F::zero())
    }

    pub fn acos(self) -> Self {
        unary_op(self, OpCode::Acos, F::zero())
    }

    pub fn atan(self) -> Self {
        unary_op(self, OpCode::Atan, F::zero())
    }

    pub fn erf(self) -> Self {
        unary_op(self, OpCode::Erf, F::zero())
    }

    /// `1 / x`, recorded as a constant-numerator division.
    pub fn recip(self) -> Self {
        unary_op(self, OpCode::ConstDiv, F::one())
    }

    pub fn powi(self, n: i32) -> Self {
        match n {
            0 => Active::constant(F::one()),
            1 => self,
            _ => unary_op(self, OpCode::PowConst, F::from_f64_lossy(n as f64)),
        }
    }

    /// `self ^ exponent`.
    ///
    /// A constant exponent or base records a single constant-operand op;
    /// with both active this is `exp(exponent * ln(self))`.
    pub fn powf(self, exponent: Self) -> Self {
        match (self.is_constant(), exponent.is_constant()) {
            (true, true) => Active::constant(self.value.powf(exponent.value)),
            (false, true) => unary_op(self, OpCode::PowConst, exponent.value),
            (true, false) => unary_op(exponent, OpCode::ConstPow, self.value),
            (false, false) => (exponent * self.ln()).exp(),
        }
    }
}

impl<F: Float> Display for Active<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<F: Float> Default for Active<F> {
    fn default() -> Self {
        Active::constant(F::zero())
    }
}

impl<F: Float> PartialEq for Active<F> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<F: Float> PartialOrd for Active<F> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}
