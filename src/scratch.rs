//! Reusable staging buffers for the tensor composer.
//!
//! A [`ScratchLease`] mutably borrows its [`ScratchArena`], so a second lease
//! cannot be taken while one is alive. Dropping the lease empties the buffers
//! but keeps their capacity for the next record.

use crate::tensor::TensorIndex;

/// Owner of the staging buffers.
#[derive(Debug, Default)]
pub struct ScratchArena<F> {
    indices: Vec<TensorIndex>,
    values: Vec<F>,
    high_water: usize,
}

impl<F: Copy> ScratchArena<F> {
    pub fn new() -> Self {
        ScratchArena {
            indices: Vec::new(),
            values: Vec::new(),
            high_water: 0,
        }
    }

    /// Borrow the buffers until the returned lease is dropped.
    #[inline]
    pub fn lease(&mut self) -> ScratchLease<'_, F> {
        debug_assert!(self.indices.is_empty() && self.values.is_empty());
        ScratchLease { arena: self }
    }

    /// Capacity currently reserved, in entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.indices.capacity().min(self.values.capacity())
    }

    /// Largest number of entries staged by any single lease so far.
    #[inline]
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}

/// Exclusive, scoped access to a [`ScratchArena`].
pub struct ScratchLease<'a, F: Copy> {
    arena: &'a mut ScratchArena<F>,
}

impl<F: Copy> ScratchLease<'_, F> {
    /// Stage one `(index, value)` contribution.
    #[inline]
    pub fn push(&mut self, index: TensorIndex, value: F) {
        self.arena.indices.push(index);
        self.arena.values.push(value);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.arena.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arena.indices.is_empty()
    }

    /// Staged contributions in push order.
    pub fn iter(&self) -> impl Iterator<Item = (TensorIndex, F)> + '_ {
        self.arena
            .indices
            .iter()
            .copied()
            .zip(self.arena.values.iter().copied())
    }
}

impl<F: Copy> Drop for ScratchLease<'_, F> {
    fn drop(&mut self) {
        let n = self.arena.indices.len();
        if n > self.arena.high_water {
            self.arena.high_water = n;
        }
        self.arena.indices.clear();
        self.arena.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_resets_on_drop_and_keeps_capacity() {
        let mut arena = ScratchArena::<f64>::new();
        {
            let mut lease = arena.lease();
            for i in 0..10 {
                lease.push(TensorIndex::new(&[i]), i as f64);
            }
            assert_eq!(lease.len(), 10);
            assert_eq!(lease.iter().nth(3).map(|(_, v)| v), Some(3.0));
        }
        assert!(arena.capacity() >= 10);
        assert_eq!(arena.high_water(), 10);
        let lease = arena.lease();
        assert!(lease.is_empty());
    }

    #[test]
    fn lease_resets_on_panic() {
        let mut arena = ScratchArena::<f64>::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut lease = arena.lease();
            lease.push(TensorIndex::new(&[1]), 1.0);
            panic!("abort mid-record");
        }));
        assert!(result.is_err());
        assert!(arena.lease().is_empty());
    }
}
