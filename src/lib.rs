//! Higher-order reverse-mode automatic differentiation.
//!
//! Record a function onto a [`Trace`] with [`record`], then run a
//! [`ReverseSweep`] to get every partial derivative of its outputs up to
//! order [`MAX_ORDER`] as sparse symmetric tensors ([`DerivativeTensor`]).
//! Long iterative computations can be differentiated under a bounded memory
//! footprint with the checkpointing driver [`IterativeFunc`].
//!
//! ```
//! use revtensor::{derivatives, record, Active64};
//!
//! let trace = record(|x: &[Active64]| vec![x[0] * x[1] * x[2]], &[1.0, 2.0, 3.0]);
//! let d = derivatives(&trace, 2).unwrap();
//! assert_eq!(d.gradient(0), vec![6.0, 3.0, 2.0]);
//! assert_eq!(d.hessian(0)[0][2], 2.0);
//! ```

pub mod active;
pub mod api;
pub mod checkpoint;
mod coeff;
pub mod decode;
pub mod derivative;
pub mod error;
pub mod float;
pub mod opcode;
pub mod scalar;
pub mod scratch;
pub mod sweep;
pub mod tensor;
pub mod trace;
mod traits;

/// Highest supported derivative order.
pub const MAX_ORDER: usize = 6;

pub use active::Active;
pub use api::{compose, derivatives, record};
pub use checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointStats, IterativeFunc, IterativeProgram, LoopKind,
};
pub use decode::{decode, DerivativeInfo};
pub use derivative::DerivativeTensor;
pub use error::{AdError, ConsistencyError, Result};
pub use float::Float;
pub use opcode::OpCode;
pub use scalar::Scalar;
pub use scratch::{ScratchArena, ScratchLease};
pub use sweep::{ReverseSweep, SweepConfig, SweepPhase, SweepStats};
pub use tensor::{SymmetricTensor, TensorBundle, TensorIndex};
pub use trace::{LocalPartials, Location, OpRecord, Trace, TraceGuard, TraceThreadLocal, NO_LOC};

/// Type alias for active variables over `f64`.
pub type Active64 = Active<f64>;
/// Type alias for active variables over `f32`.
pub type Active32 = Active<f32>;
