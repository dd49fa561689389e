//! Checkpointed differentiation of iterative computations.
//!
//! An [`IterativeProgram`] is `y = final(step^N(initial(x)))`. Taping all `N`
//! steps at once can exhaust memory, so [`IterativeFunc::compute`] only keeps
//! state snapshots ([`Checkpoint`]s) at selected iteration boundaries. The
//! reverse pass then replays one checkpoint interval at a time into a short
//! trace, sweeps it seeded with the derivatives accumulated so far, and drops
//! both the trace and the checkpoint.
//!
//! Consecutive iterations share one checkpoint until their combined operation
//! count reaches [`CheckpointConfig::min_ops_per_checkpoint`], so the number of
//! checkpoints is roughly `total_ops / min_ops_per_checkpoint`.

use log::{debug, warn};

use crate::active::Active;
use crate::api;
use crate::derivative::DerivativeTensor;
use crate::error::{AdError, ConsistencyError, Result};
use crate::float::Float;
use crate::scalar::Scalar;
use crate::sweep::{ReverseSweep, SweepConfig};
use crate::trace::{Trace, TraceThreadLocal};

/// An iterative computation written once, generically over [`Scalar`].
///
/// Every method must be free of side effects outside the state it returns:
/// each iteration runs once in the forward pass and again during replay.
pub trait IterativeProgram<F: Float> {
    /// Map the independents `x` to the initial loop state.
    fn initial_step<T: Scalar<Float = F>>(&self, x: &[T]) -> Vec<T>;

    /// Advance the loop state by one iteration. Must preserve its length.
    fn iteration_step<T: Scalar<Float = F>>(&self, state: &[T]) -> Vec<T>;

    /// Map the final loop state to the dependents.
    fn final_step<T: Scalar<Float = F>>(&self, state: &[T]) -> Vec<T>;

    /// Loop predicate for [`LoopKind::Conditional`], checked before every
    /// iteration. Ignored by fixed loops.
    fn while_condition(&self, _state: &[F]) -> bool {
        true
    }
}

/// How the number of iterations is decided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopKind {
    /// Exactly this many iterations.
    Fixed(usize),
    /// Iterate while [`IterativeProgram::while_condition`] holds.
    Conditional,
}

/// Checkpoint placement policy and resource bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckpointConfig {
    /// Iterations are merged into one checkpoint interval until their
    /// operation count reaches this. Must be at least 1.
    pub min_ops_per_checkpoint: usize,
    /// Fail with [`AdError::CheckpointLimit`] beyond this many checkpoints.
    pub max_checkpoints: usize,
    /// Fail with [`AdError::IterationLimit`] if a conditional loop runs longer.
    pub max_iterations: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        CheckpointConfig {
            min_ops_per_checkpoint: 10_000,
            max_checkpoints: 1 << 20,
            max_iterations: 1_000_000,
        }
    }
}

impl CheckpointConfig {
    pub fn with_min_ops_per_checkpoint(mut self, n: usize) -> Self {
        self.min_ops_per_checkpoint = n;
        self
    }

    pub fn with_max_checkpoints(mut self, n: usize) -> Self {
        self.max_checkpoints = n;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_ops_per_checkpoint == 0 {
            return Err(AdError::config("min_ops_per_checkpoint must be at least 1"));
        }
        if self.max_checkpoints == 0 {
            return Err(AdError::config("max_checkpoints must be at least 1"));
        }
        Ok(())
    }
}

/// Loop state at the start of one checkpoint interval.
#[derive(Clone, Debug)]
pub struct Checkpoint<F> {
    /// Index of the first iteration in the interval.
    pub iteration: usize,
    /// Number of iterations in the interval.
    pub iterations: usize,
    /// Elementary operations recorded over the interval.
    pub ops: usize,
    pub state: Vec<F>,
}

/// Summary of the last [`IterativeFunc::compute`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckpointStats {
    pub iterations: usize,
    pub checkpoints: usize,
    pub total_ops: usize,
}

/// Checkpointing driver for an [`IterativeProgram`].
pub struct IterativeFunc<F: Float, P: IterativeProgram<F>> {
    program: P,
    kind: LoopKind,
    config: CheckpointConfig,
    last_stats: Option<CheckpointStats>,
    _marker: std::marker::PhantomData<F>,
}

impl<F, P> IterativeFunc<F, P>
where
    F: Float + TraceThreadLocal + Scalar<Float = F>,
    P: IterativeProgram<F>,
{
    pub fn new(program: P, kind: LoopKind) -> Self {
        IterativeFunc {
            program,
            kind,
            config: CheckpointConfig::default(),
            last_stats: None,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_config(mut self, config: CheckpointConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the checkpoint merge threshold. Validated by [`compute`](Self::compute).
    pub fn set_min_op_per_checkpoint(&mut self, n: usize) {
        self.config.min_ops_per_checkpoint = n;
    }

    #[inline]
    pub fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Statistics of the most recent successful `compute`.
    #[inline]
    pub fn last_stats(&self) -> Option<CheckpointStats> {
        self.last_stats
    }

    /// Whether iteration `i` runs, given the state before it.
    fn continues(&self, i: usize, state: &[F]) -> Result<bool> {
        match self.kind {
            LoopKind::Fixed(n) => Ok(i < n),
            LoopKind::Conditional => {
                if !self.program.while_condition(state) {
                    return Ok(false);
                }
                if i >= self.config.max_iterations {
                    return Err(AdError::IterationLimit {
                        limit: self.config.max_iterations,
                    });
                }
                Ok(true)
            }
        }
    }

    fn check_width(actual: usize, expected: usize) -> Result<()> {
        if actual != expected {
            return Err(AdError::DimensionMismatch {
                what: "iteration state",
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Evaluate the program numerically, without recording.
    pub fn run(&self, x: &[F]) -> Result<Vec<F>> {
        let mut state = self.program.initial_step(x);
        let width = state.len();
        let mut i = 0;
        while self.continues(i, &state)? {
            state = self.program.iteration_step(&state);
            Self::check_width(state.len(), width)?;
            i += 1;
        }
        Ok(self.program.final_step(&state))
    }

    /// Derivatives of the dependents up to `order` with respect to `x`.
    pub fn compute(&mut self, x: &[F], order: usize) -> Result<DerivativeTensor<F>> {
        let sweep_config = SweepConfig::default().with_order(order);
        sweep_config.validate()?;
        self.config.validate()?;

        // Forward: tape each iteration only to count its operations.
        let mut state = self.program.initial_step(x);
        let width = state.len();
        let mut checkpoints: Vec<Checkpoint<F>> = Vec::new();
        let mut pending_ops = 0usize;
        let mut total_ops = 0usize;
        let mut warned = false;
        let mut i = 0;
        while self.continues(i, &state)? {
            if checkpoints.is_empty() || pending_ops >= self.config.min_ops_per_checkpoint {
                if checkpoints.len() >= self.config.max_checkpoints {
                    return Err(AdError::CheckpointLimit {
                        limit: self.config.max_checkpoints,
                        min_ops_per_checkpoint: self.config.min_ops_per_checkpoint,
                    });
                }
                debug!("checkpoint {} at iteration {}", checkpoints.len(), i);
                checkpoints.push(Checkpoint {
                    iteration: i,
                    iterations: 0,
                    ops: 0,
                    state: state.clone(),
                });
                pending_ops = 0;
                if !warned && 2 * checkpoints.len() >= self.config.max_checkpoints {
                    warn!(
                        "{} of at most {} checkpoints in use; consider raising min_ops_per_checkpoint",
                        checkpoints.len(),
                        self.config.max_checkpoints
                    );
                    warned = true;
                }
            }
            let trace = self.record_iterations(&state, i, 1)?;
            let ops = trace.num_operations();
            state = trace.dependent_values();
            Self::check_width(state.len(), width)?;
            if let Some(cp) = checkpoints.last_mut() {
                cp.iterations += 1;
                cp.ops += ops;
            }
            pending_ops += ops;
            total_ops += ops;
            i += 1;
        }
        debug!(
            "forward pass: {} iterations, {} ops, {} checkpoints",
            i,
            total_ops,
            checkpoints.len()
        );
        let stats = CheckpointStats {
            iterations: i,
            checkpoints: checkpoints.len(),
            total_ops,
        };

        // Reverse: final step, then every interval from last to first.
        let final_trace = api::record(|t| self.program.final_step(t), &state);
        let mut upstream = ReverseSweep::new(&final_trace, sweep_config)?.compute()?;
        drop(final_trace);

        while let Some(cp) = checkpoints.pop() {
            debug!(
                "replaying iterations {}..{} ({} ops)",
                cp.iteration,
                cp.iteration + cp.iterations,
                cp.ops
            );
            let segment = self.record_iterations(&cp.state, cp.iteration, cp.iterations)?;
            upstream = api::compose(&segment, &upstream, order)?;
        }

        let initial_trace = api::record(|t| self.program.initial_step(t), x);
        let result = api::compose(&initial_trace, &upstream, order)?;
        self.last_stats = Some(stats);
        Ok(result)
    }

    /// Record `count` iterations starting at iteration `first` from `state`.
    ///
    /// Conditional loops re-check their predicate before every replayed
    /// iteration; a `false` means the step is not reproducible.
    fn record_iterations(&self, state: &[F], first: usize, count: usize) -> Result<Trace<F>> {
        let mut diverged = None;
        let trace = api::record(
            |t: &[Active<F>]| {
                let mut cur = t.to_vec();
                for j in 0..count {
                    if self.kind == LoopKind::Conditional && j > 0 {
                        let values: Vec<F> = cur.iter().map(|a| a.value()).collect();
                        if !self.program.while_condition(&values) {
                            diverged = Some(first + j);
                            break;
                        }
                    }
                    cur = self.program.iteration_step(&cur);
                }
                cur
            },
            state,
        );
        match diverged {
            Some(iteration) => Err(ConsistencyError::ReplayDiverged { iteration }.into()),
            None => Ok(trace),
        }
    }
}
