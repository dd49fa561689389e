use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Bundles the numeric traits the sweep and the recording front end need.
/// Only primitive float types implement this; [`Active`](crate::Active) does not.
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
    /// Gauss error function.
    fn erf(self) -> Self;

    /// Lossy conversion from an `f64` constant (coefficient tables, literals).
    #[inline]
    fn from_f64_lossy(v: f64) -> Self {
        <Self as FromPrimitive>::from_f64(v).unwrap_or_else(<Self as NumFloat>::nan)
    }
}

impl Float for f32 {
    #[inline]
    fn erf(self) -> Self {
        libm::erff(self)
    }
}

impl Float for f64 {
    #[inline]
    fn erf(self) -> Self {
        libm::erf(self)
    }
}
