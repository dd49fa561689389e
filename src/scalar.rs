//! The [`Scalar`] trait for writing trace-generic numeric code.
//!
//! A step written as `fn step<T: Scalar>(x: &[T]) -> Vec<T>` runs on plain
//! `f32`/`f64` (no recording) and on [`Active<F>`] (recording onto the current
//! trace). The iterative checkpoint scheduler relies on this to replay the
//! same step in both modes.

use std::fmt::{Debug, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::active::Active;
use crate::float::Float;
use crate::trace::TraceThreadLocal;

/// Operations every recordable scalar supports.
///
/// Only the elementary functions the trace can differentiate to any order
/// are listed here; non-smooth functions (`abs`, `floor`, ...) are not.
pub trait Scalar:
    Copy
    + Debug
    + Display
    + Default
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// The underlying primitive float type.
    type Float: Float;

    /// Lift a plain float to this scalar (constant, zero derivative).
    fn from_f(val: Self::Float) -> Self;

    /// Extract the primal value.
    fn value(&self) -> Self::Float;

    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn asin(self) -> Self;
    fn acos(self) -> Self;
    fn atan(self) -> Self;
    fn erf(self) -> Self;
    fn powi(self, n: i32) -> Self;
    fn powf(self, exponent: Self) -> Self;

    fn tan(self) -> Self {
        self.sin() / self.cos()
    }

    fn recip(self) -> Self {
        Self::from_f(<Self::Float as num_traits::One>::one()) / self
    }

    /// Lift an `f64` literal.
    fn from_f64(val: f64) -> Self {
        Self::from_f(Self::Float::from_f64_lossy(val))
    }
}

macro_rules! impl_scalar_for_float {
    ($f:ty) => {
        impl Scalar for $f {
            type Float = $f;

            #[inline]
            fn from_f(val: $f) -> Self {
                val
            }

            #[inline]
            fn value(&self) -> $f {
                *self
            }

            #[inline]
            fn sqrt(self) -> Self {
                <$f>::sqrt(self)
            }
            #[inline]
            fn exp(self) -> Self {
                <$f>::exp(self)
            }
            #[inline]
            fn ln(self) -> Self {
                <$f>::ln(self)
            }
            #[inline]
            fn sin(self) -> Self {
                <$f>::sin(self)
            }
            #[inline]
            fn cos(self) -> Self {
                <$f>::cos(self)
            }
            #[inline]
            fn asin(self) -> Self {
                <$f>::asin(self)
            }
            #[inline]
            fn acos(self) -> Self {
                <$f>::acos(self)
            }
            #[inline]
            fn atan(self) -> Self {
                <$f>::atan(self)
            }
            #[inline]
            fn erf(self) -> Self {
                Float::erf(self)
            }
            #[inline]
            fn powi(self, n: i32) -> Self {
                <$f>::powi(self, n)
            }
            #[inline]
            fn powf(self, exponent: Self) -> Self {
                <$f>::powf(self, exponent)
            }
            #[inline]
            fn tan(self) -> Self {
                <$f>::tan(self)
            }
            #[inline]
            fn recip(self) -> Self {
                <$f>::recip(self)
            }
        }
    };
}

impl_scalar_for_float!(f32);
impl_scalar_for_float!(f64);

impl<F: Float + TraceThreadLocal> Scalar for Active<F> {
    type Float = F;

    #[inline]
    fn from_f(val: F) -> Self {
        Active::constant(val)
    }

    #[inline]
    fn value(&self) -> F {
        self.value
    }

    #[inline]
    fn sqrt(self) -> Self {
        Active::sqrt(self)
    }
    #[inline]
    fn exp(self) -> Self {
        Active::exp(self)
    }
    #[inline]
    fn ln(self) -> Self {
        Active::ln(self)
    }
    #[inline]
    fn sin(self) -> Self {
        Active::sin(self)
    }
    #[inline]
    fn cos(self) -> Self {
        Active::cos(self)
    }
    #[inline]
    fn asin(self) -> Self {
        Active::asin(self)
    }
    #[inline]
    fn acos(self) -> Self {
        Active::acos(self)
    }
    #[inline]
    fn atan(self) -> Self {
        Active::atan(self)
    }
    #[inline]
    fn erf(self) -> Self {
        Active::erf(self)
    }
    #[inline]
    fn powi(self, n: i32) -> Self {
        Active::powi(self, n)
    }
    #[inline]
    fn powf(self, exponent: Self) -> Self {
        Active::powf(self, exponent)
    }
    #[inline]
    fn tan(self) -> Self {
        Active::tan(self)
    }
    #[inline]
    fn recip(self) -> Self {
        Active::recip(self)
    }
}
