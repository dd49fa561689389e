//! Recorded operation traces.
//!
//! A [`Trace`] is an append-only list of [`OpRecord`]s. Every record defines a
//! fresh [`Location`] strictly greater than the locations of its operands, so
//! walking the records backwards visits every use of a location before its
//! definition. Traces are produced by [`record`](crate::record) or assembled
//! by hand with [`Trace::from_parts`], and are read-only to the sweep.

use crate::error::{ConsistencyError, Result};
use crate::float::Float;
use crate::opcode::{self, OpCode};

mod thread_local;
pub use self::thread_local::{with_active_trace, TraceGuard, TraceThreadLocal};

/// Identifier of a value slot on a trace.
pub type Location = u32;

/// Sentinel: no location (absent operand, or an untracked constant).
pub const NO_LOC: Location = u32::MAX;

/// Partial derivatives of one record up to third order.
///
/// `x`/`y` name the first and second operand. Unary records leave every
/// `y`-bearing partial at zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalPartials<F> {
    pub dx: F,
    pub dy: F,
    pub pxx: F,
    pub pxy: F,
    pub pyy: F,
    pub pxxx: F,
    pub pxxy: F,
    pub pxyy: F,
    pub pyyy: F,
}

/// One elementary operation `r = opcode(x, y)`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpRecord<F> {
    pub opcode: OpCode,
    /// Result location.
    pub r: Location,
    /// First operand, or [`NO_LOC`].
    pub x: Location,
    /// Second operand, or [`NO_LOC`].
    pub y: Location,
    /// Result value.
    pub value: F,
    pub vx: F,
    pub vy: F,
    /// Constant operand: exponent of `PowConst`, base of `ConstPow`,
    /// numerator of `ConstDiv`.
    pub coval: F,
    pub partials: LocalPartials<F>,
}

/// A recorded program: records plus its independent and dependent locations.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Trace<F> {
    pub(crate) records: Vec<OpRecord<F>>,
    pub(crate) independents: Vec<Location>,
    pub(crate) dependents: Vec<Location>,
}

impl<F: Float> Trace<F> {
    /// Create an empty trace.
    pub fn new() -> Self {
        Trace {
            records: Vec::new(),
            independents: Vec::new(),
            dependents: Vec::new(),
        }
    }

    /// Create an empty trace with room for `est_ops` records.
    pub fn with_capacity(est_ops: usize) -> Self {
        Trace {
            records: Vec::with_capacity(est_ops),
            independents: Vec::new(),
            dependents: Vec::new(),
        }
    }

    /// Assemble a trace from externally produced records and validate it.
    pub fn from_parts(
        records: Vec<OpRecord<F>>,
        independents: Vec<Location>,
        dependents: Vec<Location>,
    ) -> Result<Self> {
        let trace = Trace {
            records,
            independents,
            dependents,
        };
        trace.validate()?;
        Ok(trace)
    }

    /// Check the ordering invariants the reverse sweep relies on.
    ///
    /// Result locations must be strictly increasing, every operand must be
    /// defined by an earlier record, independents must be `Input` records and
    /// dependents must be defined somewhere on the trace.
    pub fn validate(&self) -> Result<()> {
        let mut prev: Option<Location> = None;
        for (i, rec) in self.records.iter().enumerate() {
            if rec.r == NO_LOC || prev.is_some_and(|p| rec.r <= p) {
                return Err(ConsistencyError::NonMonotonic {
                    record: i,
                    location: rec.r,
                }
                .into());
            }
            for operand in [rec.x, rec.y].into_iter().take(rec.opcode.arity()) {
                if operand == NO_LOC || operand >= rec.r {
                    return Err(ConsistencyError::NonMonotonic {
                        record: i,
                        location: operand,
                    }
                    .into());
                }
                if self.records[..i]
                    .binary_search_by_key(&operand, |r| r.r)
                    .is_err()
                {
                    return Err(ConsistencyError::UnknownLocation { location: operand }.into());
                }
            }
            prev = Some(rec.r);
        }
        for &loc in &self.independents {
            match self.record_at(loc) {
                Some(rec) if rec.opcode == OpCode::Input => {}
                _ => return Err(ConsistencyError::UnknownLocation { location: loc }.into()),
            }
        }
        for &loc in &self.dependents {
            if self.record_at(loc).is_none() {
                return Err(ConsistencyError::UnknownLocation { location: loc }.into());
            }
        }
        Ok(())
    }

    /// Register an independent variable. Returns its location.
    #[inline]
    pub fn push_input(&mut self, value: F) -> Location {
        let r = self.next_location();
        self.records.push(OpRecord {
            opcode: OpCode::Input,
            r,
            x: NO_LOC,
            y: NO_LOC,
            value,
            vx: F::zero(),
            vy: F::zero(),
            coval: F::zero(),
            partials: LocalPartials::default(),
        });
        self.independents.push(r);
        r
    }

    /// Record a constant. Returns its location.
    #[inline]
    pub fn push_const(&mut self, value: F) -> Location {
        let r = self.next_location();
        self.records.push(OpRecord {
            opcode: OpCode::Const,
            r,
            x: NO_LOC,
            y: NO_LOC,
            value,
            vx: F::zero(),
            vy: F::zero(),
            coval: F::zero(),
            partials: LocalPartials::default(),
        });
        r
    }

    /// Record a unary operation on `x`. Returns the result location and value.
    #[inline]
    pub fn push_unary(&mut self, op: OpCode, x: Location, vx: F, coval: F) -> (Location, F) {
        debug_assert_eq!(op.arity(), 1, "{:?} is not unary", op);
        let value = opcode::eval_forward(op, vx, F::zero(), coval);
        let partials = opcode::local_partials(op, vx, F::zero(), coval, value);
        let r = self.next_location();
        self.records.push(OpRecord {
            opcode: op,
            r,
            x,
            y: NO_LOC,
            value,
            vx,
            vy: F::zero(),
            coval,
            partials,
        });
        (r, value)
    }

    /// Record a binary operation on `x` and `y`. Returns the result location and value.
    #[inline]
    pub fn push_binary(
        &mut self,
        op: OpCode,
        x: Location,
        vx: F,
        y: Location,
        vy: F,
    ) -> (Location, F) {
        debug_assert_eq!(op.arity(), 2, "{:?} is not binary", op);
        let value = opcode::eval_forward(op, vx, vy, F::zero());
        let partials = opcode::local_partials(op, vx, vy, F::zero(), value);
        let r = self.next_location();
        self.records.push(OpRecord {
            opcode: op,
            r,
            x,
            y,
            value,
            vx,
            vy,
            coval: F::zero(),
            partials,
        });
        (r, value)
    }

    /// Mark the dependent (output) locations.
    pub fn set_dependents(&mut self, locations: &[Location]) {
        self.dependents = locations.to_vec();
    }

    #[inline]
    fn next_location(&self) -> Location {
        let r = self.records.len();
        assert!(r < NO_LOC as usize, "trace location space exhausted");
        r as Location
    }

    /// All records in recording order.
    #[inline]
    pub fn records(&self) -> &[OpRecord<F>] {
        &self.records
    }

    /// Independent locations, in input order.
    #[inline]
    pub fn independents(&self) -> &[Location] {
        &self.independents
    }

    /// Dependent locations, in output order.
    #[inline]
    pub fn dependents(&self) -> &[Location] {
        &self.dependents
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.independents.len()
    }

    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.dependents.len()
    }

    /// Number of elementary operations (records other than inputs and constants).
    pub fn num_operations(&self) -> usize {
        self.records
            .iter()
            .filter(|r| !matches!(r.opcode, OpCode::Input | OpCode::Const))
            .count()
    }

    /// The record defining `loc`, if any.
    pub fn record_at(&self, loc: Location) -> Option<&OpRecord<F>> {
        // recorded traces have r == index; from_parts traces only guarantee order
        match self.records.get(loc as usize) {
            Some(rec) if rec.r == loc => Some(rec),
            _ => self
                .records
                .binary_search_by_key(&loc, |r| r.r)
                .ok()
                .map(|i| &self.records[i]),
        }
    }

    /// Value stored at `loc`, if it is defined.
    #[inline]
    pub fn value(&self, loc: Location) -> Option<F> {
        self.record_at(loc).map(|r| r.value)
    }

    /// Values of the dependents, in output order.
    pub fn dependent_values(&self) -> Vec<F> {
        self.dependents
            .iter()
            .map(|&loc| self.value(loc).unwrap_or_else(F::nan))
            .collect()
    }
}
