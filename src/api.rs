use crate::active::Active;
use crate::derivative::DerivativeTensor;
use crate::error::Result;
use crate::float::Float;
use crate::sweep::{ReverseSweep, SweepConfig};
use crate::trace::{Trace, TraceGuard, TraceThreadLocal};

/// Record `f` evaluated at `x` onto a fresh [`Trace`].
///
/// Each element of `x` becomes one `Input` record, in order. Outputs that are
/// constants (not depending on any input) are placed on the trace as `Const`
/// records so every dependent has a location.
///
/// ```
/// let trace = revtensor::record(|x: &[revtensor::Active64]| {
///     vec![x[0] * x[1] + x[0].sin()]
/// }, &[1.0, 2.0]);
/// assert_eq!(trace.num_inputs(), 2);
/// assert_eq!(trace.num_outputs(), 1);
/// ```
pub fn record<F: Float + TraceThreadLocal>(
    f: impl FnOnce(&[Active<F>]) -> Vec<Active<F>>,
    x: &[F],
) -> Trace<F> {
    let mut trace = Trace::with_capacity(x.len() * 10);

    let inputs: Vec<Active<F>> = x
        .iter()
        .map(|&val| Active::from_trace(val, trace.push_input(val)))
        .collect();

    let outputs = {
        let _guard = TraceGuard::new(&mut trace);
        f(&inputs)
    };

    let deps: Vec<_> = outputs
        .iter()
        .map(|o| {
            if o.is_constant() {
                trace.push_const(o.value())
            } else {
                o.location()
            }
        })
        .collect();
    trace.set_dependents(&deps);
    trace
}

/// All derivatives of the trace's dependents up to `order`.
///
/// ```
/// let trace = revtensor::record(|x: &[revtensor::Active64]| {
///     vec![x[0] * x[0] * x[1]]
/// }, &[3.0, 2.0]);
/// let d = revtensor::derivatives(&trace, 2).unwrap();
/// assert_eq!(d.gradient(0), vec![12.0, 9.0]);
/// assert_eq!(d.value(0, &[0, 1]), 6.0);
/// ```
pub fn derivatives<F: Float>(trace: &Trace<F>, order: usize) -> Result<DerivativeTensor<F>> {
    ReverseSweep::new(trace, SweepConfig::default().with_order(order))?.compute()
}

/// Chain `upstream` (derivatives of a later computation with respect to this
/// trace's dependents) through `trace`, up to `order`.
pub fn compose<F: Float>(
    trace: &Trace<F>,
    upstream: &DerivativeTensor<F>,
    order: usize,
) -> Result<DerivativeTensor<F>> {
    let mut sweep = ReverseSweep::new(trace, SweepConfig::default().with_order(order))?;
    sweep.seed_with(upstream)?;
    sweep.compute()
}
