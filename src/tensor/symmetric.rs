use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use crate::error::{AdError, Result};
use crate::float::Float;
use crate::trace::Location;
use crate::MAX_ORDER;

use super::index::{ColexKey, TensorIndex};

/// Sparse symmetric tensor of a fixed rank.
///
/// Each entry is keyed by its canonical [`TensorIndex`], so all permutations
/// of an index tuple address the same coefficient. Exact zeros are never
/// stored.
#[derive(Clone, Debug, PartialEq)]
pub struct SymmetricTensor<F> {
    rank: usize,
    entries: BTreeMap<ColexKey, F>,
}

impl<F: Float> SymmetricTensor<F> {
    /// Create an empty tensor of the given rank.
    pub fn new(rank: usize) -> Result<Self> {
        if rank > MAX_ORDER {
            return Err(AdError::InvalidOrder {
                order: rank,
                max: MAX_ORDER,
            });
        }
        Ok(SymmetricTensor {
            rank,
            entries: BTreeMap::new(),
        })
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Add `value` to the entry at `index`.
    ///
    /// A zero `value` is ignored; an entry whose sum becomes exactly zero is
    /// removed.
    pub fn increase(&mut self, index: TensorIndex, value: F) {
        assert_eq!(
            index.rank(),
            self.rank,
            "index rank does not match tensor rank"
        );
        if value == F::zero() {
            return;
        }
        let key = ColexKey(index);
        match self.entries.get_mut(&key) {
            Some(v) => {
                *v = *v + value;
                if *v == F::zero() {
                    self.entries.remove(&key);
                }
            }
            None => {
                self.entries.insert(key, value);
            }
        }
    }

    /// [`increase`](Self::increase) with an index tuple in any order.
    #[inline]
    pub fn increase_at(&mut self, locs: &[Location], value: F) {
        self.increase(TensorIndex::new(locs), value);
    }

    /// Coefficient at `locs` (any order); zero when absent.
    pub fn get(&self, locs: &[Location]) -> F {
        if locs.len() != self.rank {
            return F::zero();
        }
        self.entries
            .get(&ColexKey(TensorIndex::new(locs)))
            .copied()
            .unwrap_or_else(F::zero)
    }

    /// Remove every entry containing `loc` and return them as a rank-`d-1`
    /// tensor with one copy of `loc` removed from each index.
    ///
    /// Fast when `loc` is the largest location stored (the reverse sweep
    /// always asks for that one): the matching entries form the tail of the
    /// colex-ordered map.
    pub fn get_and_erase(&mut self, loc: Location) -> SymmetricTensor<F> {
        assert!(self.rank > 0, "cannot slice a rank-0 tensor");
        let mut slice = SymmetricTensor {
            rank: self.rank - 1,
            entries: BTreeMap::new(),
        };
        let max_last = match self.entries.last_key_value() {
            Some((k, _)) => k.0.last(),
            None => return slice,
        };

        if max_last <= Some(loc) {
            let tail = self.entries.split_off(&ColexKey::lower_bound(self.rank, loc));
            for (key, v) in tail {
                // every tail key ends in `loc`
                if let Some(rest) = key.0.remove_one(loc) {
                    slice.entries.insert(ColexKey(rest), v);
                }
            }
        } else {
            let matching: Vec<ColexKey> = self
                .entries
                .keys()
                .filter(|k| k.0.contains(loc))
                .copied()
                .collect();
            for key in matching {
                if let (Some(v), Some(rest)) = (self.entries.remove(&key), key.0.remove_one(loc)) {
                    slice.entries.insert(ColexKey(rest), v);
                }
            }
        }
        slice
    }

    /// Entries in ascending lexicographic order of their canonical index.
    ///
    /// Storage is colex-ordered, so the lexicographic order is produced on the
    /// fly from a heap: each step costs `O(log n)` and nothing is sorted for
    /// entries that are never pulled.
    pub fn enumerate(&self) -> Entries<'_, F> {
        Entries {
            heap: self
                .entries
                .iter()
                .map(|(k, v)| LexHead { index: &k.0, value: v })
                .collect(),
        }
    }

    /// Entries in storage order (no sorting).
    #[inline]
    pub(crate) fn iter_unordered(&self) -> impl Iterator<Item = (&TensorIndex, &F)> {
        self.entries.iter().map(|(k, v)| (&k.0, v))
    }
}

/// Heap item ordered so that the max-heap pops the lexicographically
/// smallest index first.
struct LexHead<'a, F> {
    index: &'a TensorIndex,
    value: &'a F,
}

impl<F> PartialEq for LexHead<'_, F> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<F> Eq for LexHead<'_, F> {}

impl<F> PartialOrd for LexHead<'_, F> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<F> Ord for LexHead<'_, F> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.index.cmp(self.index)
    }
}

/// Lazy lexicographic iterator returned by [`SymmetricTensor::enumerate`].
pub struct Entries<'a, F> {
    heap: BinaryHeap<LexHead<'a, F>>,
}

impl<F: Copy> Iterator for Entries<'_, F> {
    type Item = (TensorIndex, F);

    fn next(&mut self) -> Option<Self::Item> {
        self.heap.pop().map(|h| (*h.index, *h.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.heap.len(), Some(self.heap.len()))
    }
}

impl<F: Copy> ExactSizeIterator for Entries<'_, F> {}
