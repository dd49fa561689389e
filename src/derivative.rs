//! Materialized derivative tensors.

use crate::float::Float;

/// Sorted sparse entries of one order for one dependent.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub(crate) struct OrderBlock<F> {
    pub(crate) indices: Vec<Vec<usize>>,
    pub(crate) values: Vec<F>,
}

impl<F: Float> OrderBlock<F> {
    /// Build from unsorted, possibly repeated `(sorted tuple, value)` pairs.
    pub(crate) fn from_entries(mut entries: Vec<(Vec<usize>, F)>) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut block = OrderBlock {
            indices: Vec::with_capacity(entries.len()),
            values: Vec::with_capacity(entries.len()),
        };
        for (idx, v) in entries {
            if block.indices.last() == Some(&idx) {
                if let Some(last) = block.values.last_mut() {
                    *last = *last + v;
                }
            } else {
                block.indices.push(idx);
                block.values.push(v);
            }
        }
        // merged duplicates can cancel
        if block.values.iter().any(|&v| v == F::zero()) {
            let (indices, values) = block
                .indices
                .into_iter()
                .zip(block.values)
                .filter(|(_, v)| *v != F::zero())
                .unzip();
            block = OrderBlock { indices, values };
        }
        block
    }
}

/// Derivatives of every dependent up to a fixed order, keyed by independent
/// index tuples.
///
/// Index tuples are sorted non-decreasing and listed in ascending
/// lexicographic order; only nonzero entries appear.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DerivativeTensor<F> {
    order: usize,
    num_inputs: usize,
    dependent_values: Vec<F>,
    /// `blocks[dep][k - 1]` holds order `k`.
    blocks: Vec<Vec<OrderBlock<F>>>,
}

impl<F: Float> DerivativeTensor<F> {
    pub(crate) fn from_blocks(
        order: usize,
        num_inputs: usize,
        dependent_values: Vec<F>,
        blocks: Vec<Vec<OrderBlock<F>>>,
    ) -> Self {
        debug_assert_eq!(dependent_values.len(), blocks.len());
        debug_assert!(blocks.iter().all(|b| b.len() == order));
        DerivativeTensor {
            order,
            num_inputs,
            dependent_values,
            blocks,
        }
    }

    /// Highest derivative order held.
    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    #[inline]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    #[inline]
    pub fn num_outputs(&self) -> usize {
        self.blocks.len()
    }

    /// Values of the dependents at the recorded point.
    #[inline]
    pub fn dependent_values(&self) -> &[F] {
        &self.dependent_values
    }

    fn block(&self, dep: usize, order: usize) -> &OrderBlock<F> {
        assert!(
            dep < self.blocks.len(),
            "dependent {} out of range ({} dependents)",
            dep,
            self.blocks.len()
        );
        assert!(
            (1..=self.order).contains(&order),
            "order {} out of range 1..={}",
            order,
            self.order
        );
        &self.blocks[dep][order - 1]
    }

    /// Nonzero order-`order` derivatives of dependent `dep`.
    ///
    /// Panics if `dep` or `order` is out of range.
    pub fn get_values(&self, dep: usize, order: usize) -> (&[Vec<usize>], &[F]) {
        let b = self.block(dep, order);
        (&b.indices, &b.values)
    }

    /// Number of stored entries of one order.
    pub fn nnz(&self, dep: usize, order: usize) -> usize {
        self.block(dep, order).values.len()
    }

    /// A single derivative; `index` may be in any order. Zero when absent.
    pub fn value(&self, dep: usize, index: &[usize]) -> F {
        let b = self.block(dep, index.len());
        let mut key = index.to_vec();
        key.sort_unstable();
        match b.indices.binary_search(&key) {
            Ok(i) => b.values[i],
            Err(_) => F::zero(),
        }
    }

    /// Dense gradient of dependent `dep`.
    pub fn gradient(&self, dep: usize) -> Vec<F> {
        let mut g = vec![F::zero(); self.num_inputs];
        let (idx, vals) = self.get_values(dep, 1);
        for (i, &v) in idx.iter().zip(vals) {
            g[i[0]] = v;
        }
        g
    }

    /// Dense (symmetric) Hessian of dependent `dep`. Requires order ≥ 2.
    pub fn hessian(&self, dep: usize) -> Vec<Vec<F>> {
        let n = self.num_inputs;
        let mut h = vec![vec![F::zero(); n]; n];
        let (idx, vals) = self.get_values(dep, 2);
        for (ij, &v) in idx.iter().zip(vals) {
            h[ij[0]][ij[1]] = v;
            h[ij[1]][ij[0]] = v;
        }
        h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DerivativeTensor<f64> {
        let g = OrderBlock::from_entries(vec![(vec![1], 2.0), (vec![0], 1.0)]);
        let h = OrderBlock::from_entries(vec![(vec![0, 1], 3.0), (vec![1, 1], 4.0), (vec![0, 1], 0.5)]);
        DerivativeTensor::from_blocks(2, 3, vec![7.0], vec![vec![g, h]])
    }

    #[test]
    fn entries_are_sorted_and_merged() {
        let d = sample();
        let (idx, vals) = d.get_values(0, 2);
        assert_eq!(idx, &[vec![0, 1], vec![1, 1]]);
        assert_eq!(vals, &[3.5, 4.0]);
        assert_eq!(d.nnz(0, 1), 2);
    }

    #[test]
    fn value_accepts_any_permutation() {
        let d = sample();
        assert_eq!(d.value(0, &[1, 0]), 3.5);
        assert_eq!(d.value(0, &[2, 0]), 0.0);
    }

    #[test]
    fn dense_views() {
        let d = sample();
        assert_eq!(d.gradient(0), vec![1.0, 2.0, 0.0]);
        let h = d.hessian(0);
        assert_eq!(h[1][0], 3.5);
        assert_eq!(h[0][1], 3.5);
        assert_eq!(h[2][2], 0.0);
        assert_eq!(d.dependent_values(), &[7.0]);
    }

    #[test]
    #[should_panic(expected = "order 3 out of range")]
    fn order_out_of_range_panics() {
        sample().get_values(0, 3);
    }
}
