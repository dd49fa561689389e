//! First-order preaccumulation.
//!
//! A run starts at a record whose result is live in the global sweep and
//! keeps a private adjoint over the locations it reaches. It ends at an
//! independent, at the next globally live record, or at the end of the trace;
//! then its root's global adjoint is multiplied through the local one in a
//! single flush.

use std::collections::BTreeSet;

use log::trace;

use crate::decode::decode;
use crate::error::Result;
use crate::float::Float;
use crate::opcode::OpCode;
use crate::tensor::{SymmetricTensor, TensorIndex};
use crate::trace::Location;

use super::ReverseSweep;

struct Run<F> {
    root: Location,
    adjoint: SymmetricTensor<F>,
    live: BTreeSet<Location>,
}

impl<F: Float> Run<F> {
    fn new(root: Location) -> Result<Self> {
        let mut adjoint = SymmetricTensor::new(1)?;
        adjoint.increase(TensorIndex::new(&[root]), F::one());
        Ok(Run {
            root,
            adjoint,
            live: BTreeSet::from([root]),
        })
    }
}

impl<F: Float> ReverseSweep<'_, F> {
    pub(super) fn sweep_preaccumulated(&mut self) -> Result<()> {
        let trace = self.trace;
        let mut run: Option<Run<F>> = None;

        for rec in trace.records().iter().rev() {
            if !rec.opcode.is_collapsible() {
                if let Some(done) = run.take() {
                    self.flush(done);
                }
                continue;
            }
            self.stats.max_live = self.stats.max_live.max(self.live.len());

            if self.live.contains(rec.r) {
                // the result has a consumer outside the current run
                if let Some(done) = run.take() {
                    self.flush(done);
                }
                run = Some(Run::new(rec.r)?);
                self.stats.preaccumulated_runs += 1;
            }

            let cur = match run.as_mut() {
                Some(cur) if cur.live.contains(&rec.r) => cur,
                _ => {
                    self.stats.records_skipped += 1;
                    continue;
                }
            };
            cur.live.remove(&rec.r);
            self.stats.records_processed += 1;
            trace!("preaccumulating {:?} at {} into run {}", rec.opcode, rec.r, cur.root);

            let w = cur.adjoint.get_and_erase(rec.r).get(&[]);
            if rec.opcode == OpCode::Const {
                continue;
            }
            let info = decode(rec, 1)?;
            cur.adjoint.increase(TensorIndex::new(&[rec.x]), w * info.get(1, 0));
            cur.live.insert(rec.x);
            if !info.is_unary() {
                cur.adjoint.increase(TensorIndex::new(&[rec.y]), w * info.get(0, 1));
                cur.live.insert(rec.y);
            }
        }
        if let Some(done) = run.take() {
            self.flush(done);
        }
        Ok(())
    }

    /// Replace the root's global adjoint by its product with the run's local one.
    fn flush(&mut self, run: Run<F>) {
        let Some(deps) = self.live.take(run.root) else {
            return;
        };
        for dep in deps {
            let bundle = &mut self.bundles[dep];
            let w = bundle.get_and_erase(run.root).rank(0).get(&[]);
            for (index, &v) in run.adjoint.iter_unordered() {
                bundle.rank_mut(1).increase(*index, w * v);
            }
            for &loc in &run.live {
                self.live.insert(loc, dep);
            }
        }
    }
}
