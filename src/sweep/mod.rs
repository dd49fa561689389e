//! Reverse sweep engine.
//!
//! A [`ReverseSweep`] walks a [`Trace`] backwards once, carrying one
//! [`TensorBundle`] per dependent. Each record whose result is live has its
//! slice taken out of every affected bundle and pushed onto its operands by the
//! [composer](compose). When the walk ends only independents may still be live;
//! their entries are translated to independent numbering and returned as a
//! [`DerivativeTensor`].
//!
//! ```text
//! Idle ──seed──▶ Seeded ──sweep──▶ Sweeping ──▶ Drained ──materialize──▶ Materialized
//! ```

use std::collections::HashMap;

use log::{debug, trace};

use crate::decode::decode;
use crate::derivative::{DerivativeTensor, OrderBlock};
use crate::error::{AdError, ConsistencyError, Result};
use crate::float::Float;
use crate::opcode::OpCode;
use crate::scratch::ScratchArena;
use crate::tensor::{multiset_permutations, TensorBundle, TensorIndex};
use crate::trace::{Location, Trace};
use crate::MAX_ORDER;

mod compose;
mod live;
mod preacc;

use self::compose::Composer;
pub use self::live::LiveSet;

/// Sweep configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SweepConfig {
    /// Highest derivative order to compute, `1..=MAX_ORDER`.
    pub order: usize,
    /// Collapse straight-line runs into a local adjoint first. First order only.
    pub preaccumulate: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            order: 1,
            preaccumulate: false,
        }
    }
}

impl SweepConfig {
    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    pub fn with_preaccumulation(mut self, enabled: bool) -> Self {
        self.preaccumulate = enabled;
        self
    }

    /// Reject out-of-range orders and unsupported combinations.
    pub fn validate(&self) -> Result<()> {
        if self.order == 0 || self.order > MAX_ORDER {
            return Err(AdError::InvalidOrder {
                order: self.order,
                max: MAX_ORDER,
            });
        }
        if self.preaccumulate && self.order > 1 {
            return Err(AdError::config(format!(
                "preaccumulation supports first-order sweeps only (requested order {})",
                self.order
            )));
        }
        Ok(())
    }
}

/// Lifecycle of a [`ReverseSweep`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepPhase {
    Idle,
    Seeded,
    Sweeping,
    Drained,
    Materialized,
}

/// Counters collected while sweeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Records whose result was live when reached.
    pub records_processed: usize,
    /// Records skipped because nothing depended on their result.
    pub records_skipped: usize,
    /// Straight-line runs collapsed by preaccumulation.
    pub preaccumulated_runs: usize,
    /// Largest number of simultaneously live locations.
    pub max_live: usize,
}

/// Single-use reverse sweep over one trace.
pub struct ReverseSweep<'t, F: Float> {
    trace: &'t Trace<F>,
    config: SweepConfig,
    phase: SweepPhase,
    bundles: Vec<TensorBundle<F>>,
    live: LiveSet,
    dependent_values: Vec<F>,
    composer: Composer<F>,
    arena: ScratchArena<F>,
    stats: SweepStats,
}

impl<'t, F: Float> ReverseSweep<'t, F> {
    /// Validate `config` and `trace` and create an idle sweep.
    pub fn new(trace: &'t Trace<F>, config: SweepConfig) -> Result<Self> {
        config.validate()?;
        trace.validate()?;
        Ok(ReverseSweep {
            trace,
            config,
            phase: SweepPhase::Idle,
            bundles: Vec::new(),
            live: LiveSet::new(),
            dependent_values: Vec::new(),
            composer: Composer::new(config.order),
            arena: ScratchArena::new(),
            stats: SweepStats::default(),
        })
    }

    #[inline]
    pub fn phase(&self) -> SweepPhase {
        self.phase
    }

    #[inline]
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    #[inline]
    pub fn stats(&self) -> SweepStats {
        self.stats
    }

    /// Locations that currently carry sensitivity, ascending.
    pub fn live_locations(&self) -> Vec<Location> {
        self.live.locations().collect()
    }

    fn expect_phase(&self, expected: SweepPhase, action: &str) -> Result<()> {
        if self.phase != expected {
            return Err(AdError::config(format!(
                "cannot {} a sweep in phase {:?}",
                action, self.phase
            )));
        }
        Ok(())
    }

    /// Seed a unit first-order entry at every dependent.
    pub fn seed(&mut self) -> Result<()> {
        self.expect_phase(SweepPhase::Idle, "seed")?;
        let order = self.config.order;
        self.bundles = Vec::with_capacity(self.trace.num_outputs());
        for (dep, &loc) in self.trace.dependents().iter().enumerate() {
            let mut bundle = TensorBundle::new(order)?;
            bundle.rank_mut(1).increase(TensorIndex::new(&[loc]), F::one());
            self.bundles.push(bundle);
            self.live.insert(loc, dep);
        }
        self.dependent_values = self.trace.dependent_values();
        self.phase = SweepPhase::Seeded;
        debug!(
            "seeded order-{} sweep: {} dependents, {} records",
            order,
            self.bundles.len(),
            self.trace.records().len()
        );
        Ok(())
    }

    /// Seed from derivatives of a downstream computation whose independents
    /// are this trace's dependents.
    ///
    /// The result of the sweep is then the derivative of `upstream`'s
    /// dependents with respect to this trace's independents.
    pub fn seed_with(&mut self, upstream: &DerivativeTensor<F>) -> Result<()> {
        self.expect_phase(SweepPhase::Idle, "seed")?;
        let deps = self.trace.dependents();
        if upstream.num_inputs() != deps.len() {
            return Err(AdError::DimensionMismatch {
                what: "upstream independents",
                expected: deps.len(),
                actual: upstream.num_inputs(),
            });
        }
        let order = self.config.order;
        if upstream.order() < order {
            return Err(AdError::config(format!(
                "upstream derivatives have order {}, sweep needs {}",
                upstream.order(),
                order
            )));
        }

        self.bundles = Vec::with_capacity(upstream.num_outputs());
        let mut locs: Vec<Location> = Vec::with_capacity(order);
        for dep in 0..upstream.num_outputs() {
            let mut bundle = TensorBundle::new(order)?;
            for k in 1..=order {
                let (indices, values) = upstream.get_values(dep, k);
                for (idx, &v) in indices.iter().zip(values) {
                    locs.clear();
                    locs.extend(idx.iter().map(|&i| deps[i]));
                    let target = TensorIndex::new(&locs);
                    // several dependents may share one location
                    let weight = multiset_permutations(idx) as f64 / target.permutations() as f64;
                    bundle
                        .rank_mut(k)
                        .increase(target, v * F::from_f64_lossy(weight));
                    for &loc in target.as_slice() {
                        self.live.insert(loc, dep);
                    }
                }
            }
            self.bundles.push(bundle);
        }
        self.dependent_values = upstream.dependent_values().to_vec();
        self.phase = SweepPhase::Seeded;
        debug!(
            "seeded order-{} sweep from upstream: {} dependents, {} records",
            order,
            self.bundles.len(),
            self.trace.records().len()
        );
        Ok(())
    }

    /// Run the reverse pass and check that only independents remain live.
    pub fn sweep(&mut self) -> Result<()> {
        self.expect_phase(SweepPhase::Seeded, "sweep")?;
        self.phase = SweepPhase::Sweeping;
        if self.config.preaccumulate {
            self.sweep_preaccumulated()?;
        } else {
            self.sweep_plain()?;
        }
        self.check_drained()?;
        self.phase = SweepPhase::Drained;
        debug!("sweep drained: {:?}", self.stats);
        Ok(())
    }

    fn sweep_plain(&mut self) -> Result<()> {
        let trace = self.trace;
        let order = self.config.order;
        for rec in trace.records().iter().rev() {
            // independents stay live for materialization
            if rec.opcode == OpCode::Input {
                continue;
            }
            self.stats.max_live = self.stats.max_live.max(self.live.len());
            let deps = match self.live.take(rec.r) {
                Some(deps) => deps,
                None => {
                    self.stats.records_skipped += 1;
                    continue;
                }
            };
            self.stats.records_processed += 1;
            trace!("record {:?} at {} for {} dependents", rec.opcode, rec.r, deps.len());

            if rec.opcode == OpCode::Const {
                for &dep in &deps {
                    self.bundles[dep].get_and_erase(rec.r);
                }
                continue;
            }

            let info = decode(rec, order)?;
            self.composer.prepare(&info);
            for &dep in &deps {
                let slices = self.bundles[dep].get_and_erase(rec.r);
                self.composer
                    .compose(rec, &slices, &mut self.bundles[dep], &mut self.arena);
                self.live.insert(rec.x, dep);
                if !info.is_unary() {
                    self.live.insert(rec.y, dep);
                }
            }
        }
        Ok(())
    }

    fn check_drained(&self) -> Result<()> {
        let independents = self.trace.independents();
        for loc in self.live.locations() {
            if !independents.contains(&loc) {
                return Err(ConsistencyError::Undrained { location: loc }.into());
            }
        }
        Ok(())
    }

    /// Translate the drained bundles into a [`DerivativeTensor`].
    pub fn materialize(&mut self) -> Result<DerivativeTensor<F>> {
        self.expect_phase(SweepPhase::Drained, "materialize")?;
        let order = self.config.order;
        let index_of: HashMap<Location, usize> = self
            .trace
            .independents()
            .iter()
            .enumerate()
            .map(|(i, &loc)| (loc, i))
            .collect();

        let mut blocks = Vec::with_capacity(self.bundles.len());
        for bundle in std::mem::take(&mut self.bundles) {
            let mut per_order = Vec::with_capacity(order);
            for k in 1..=order {
                let mut entries = Vec::with_capacity(bundle.rank(k).len());
                for (index, v) in bundle.rank(k).enumerate() {
                    let mut tuple = index
                        .as_slice()
                        .iter()
                        .map(|loc| {
                            index_of
                                .get(loc)
                                .copied()
                                .ok_or(ConsistencyError::Untranslatable { location: *loc })
                        })
                        .collect::<std::result::Result<Vec<usize>, _>>()?;
                    tuple.sort_unstable();
                    entries.push((tuple, v));
                }
                per_order.push(OrderBlock::from_entries(entries));
            }
            blocks.push(per_order);
        }
        self.phase = SweepPhase::Materialized;
        Ok(DerivativeTensor::from_blocks(
            order,
            self.trace.num_inputs(),
            std::mem::take(&mut self.dependent_values),
            blocks,
        ))
    }

    /// Seed (if still idle), sweep and materialize.
    pub fn compute(mut self) -> Result<DerivativeTensor<F>> {
        if self.phase == SweepPhase::Idle {
            self.seed()?;
        }
        self.sweep()?;
        self.materialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product3() -> Trace<f64> {
        // y = a * b * c at (2, 3, 5)
        let mut t = Trace::new();
        let a = t.push_input(2.0);
        let b = t.push_input(3.0);
        let c = t.push_input(5.0);
        let (ab, _) = t.push_binary(OpCode::Mul, a, 2.0, b, 3.0);
        let (y, _) = t.push_binary(OpCode::Mul, ab, 6.0, c, 5.0);
        t.set_dependents(&[y]);
        t
    }

    #[test]
    fn phases_advance() {
        let t = product3();
        let mut s = ReverseSweep::new(&t, SweepConfig::default().with_order(2)).unwrap();
        assert_eq!(s.phase(), SweepPhase::Idle);
        assert!(s.sweep().is_err());
        s.seed().unwrap();
        assert_eq!(s.phase(), SweepPhase::Seeded);
        assert!(s.seed().is_err());
        s.sweep().unwrap();
        assert_eq!(s.phase(), SweepPhase::Drained);
        assert_eq!(s.live_locations(), vec![0, 1, 2]);
        let d = s.materialize().unwrap();
        assert_eq!(s.phase(), SweepPhase::Materialized);
        assert_eq!(d.gradient(0), vec![15.0, 10.0, 6.0]);
        assert_eq!(s.stats().records_processed, 2);
    }

    #[test]
    fn config_validation() {
        let t = product3();
        assert!(matches!(
            ReverseSweep::new(&t, SweepConfig::default().with_order(0)),
            Err(AdError::InvalidOrder { order: 0, .. })
        ));
        assert!(matches!(
            ReverseSweep::new(&t, SweepConfig::default().with_order(7)),
            Err(AdError::InvalidOrder { order: 7, .. })
        ));
        let err = ReverseSweep::new(
            &t,
            SweepConfig::default().with_order(2).with_preaccumulation(true),
        )
        .err();
        assert!(err.is_some_and(|e| e.is_configuration()));
    }

    #[test]
    fn unused_records_are_skipped() {
        let mut t = product3();
        let recs = t.records().to_vec();
        let _dead = t.push_unary(OpCode::Exp, recs[0].r, 2.0, 0.0);
        let mut s = ReverseSweep::new(&t, SweepConfig::default()).unwrap();
        s.seed().unwrap();
        s.sweep().unwrap();
        assert_eq!(s.stats().records_skipped, 1);
    }
}
