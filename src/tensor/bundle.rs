use crate::error::{AdError, Result};
use crate::float::Float;
use crate::trace::Location;
use crate::MAX_ORDER;

use super::symmetric::SymmetricTensor;

/// Symmetric tensors of ranks `0..=order` attributed to one dependent.
///
/// Rank `d` holds the order-`d` derivative of the dependent with respect to
/// the locations currently carrying its sensitivity.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorBundle<F> {
    ranks: Vec<SymmetricTensor<F>>,
}

impl<F: Float> TensorBundle<F> {
    /// Create an empty bundle holding ranks `0..=order`.
    pub fn new(order: usize) -> Result<Self> {
        if order > MAX_ORDER {
            return Err(AdError::InvalidOrder {
                order,
                max: MAX_ORDER,
            });
        }
        let ranks = (0..=order)
            .map(SymmetricTensor::new)
            .collect::<Result<Vec<_>>>()?;
        Ok(TensorBundle { ranks })
    }

    /// Highest rank held.
    #[inline]
    pub fn order(&self) -> usize {
        self.ranks.len() - 1
    }

    #[inline]
    pub fn rank(&self, d: usize) -> &SymmetricTensor<F> {
        &self.ranks[d]
    }

    #[inline]
    pub fn rank_mut(&mut self, d: usize) -> &mut SymmetricTensor<F> {
        &mut self.ranks[d]
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.iter().all(SymmetricTensor::is_empty)
    }

    /// Total number of stored entries over all ranks.
    pub fn nnz(&self) -> usize {
        self.ranks.iter().map(SymmetricTensor::len).sum()
    }

    /// Slice every rank `d >= 1` at `loc`.
    ///
    /// The result has order `order() - 1`: its rank `s` is the slice of rank
    /// `s + 1`. Rank 0 of `self` is left alone.
    pub fn get_and_erase(&mut self, loc: Location) -> TensorBundle<F> {
        let ranks = self.ranks[1..]
            .iter_mut()
            .map(|t| t.get_and_erase(loc))
            .collect();
        TensorBundle { ranks }
    }
}
