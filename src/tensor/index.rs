use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::trace::Location;
use crate::MAX_ORDER;

/// Canonical (non-decreasing) index tuple of a symmetric tensor entry.
///
/// Stored inline; at most [`MAX_ORDER`] locations. Equality, hashing and
/// ordering only look at the first `rank()` slots, and `Ord` is plain
/// lexicographic order over the sorted tuple.
#[derive(Clone, Copy)]
pub struct TensorIndex {
    len: u8,
    locs: [Location; MAX_ORDER],
}

impl TensorIndex {
    /// The rank-0 index `()`.
    pub const EMPTY: TensorIndex = TensorIndex {
        len: 0,
        locs: [0; MAX_ORDER],
    };

    /// Canonicalize an index tuple given in any order.
    ///
    /// Panics if more than [`MAX_ORDER`] locations are given.
    pub fn new(locs: &[Location]) -> Self {
        assert!(
            locs.len() <= MAX_ORDER,
            "tensor index rank {} exceeds maximum {}",
            locs.len(),
            MAX_ORDER
        );
        let mut idx = TensorIndex::EMPTY;
        idx.locs[..locs.len()].copy_from_slice(locs);
        idx.len = locs.len() as u8;
        idx.locs[..locs.len()].sort_unstable();
        idx
    }

    #[inline]
    pub fn rank(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn as_slice(&self) -> &[Location] {
        &self.locs[..self.len as usize]
    }

    /// Largest location in the tuple.
    #[inline]
    pub fn last(&self) -> Option<Location> {
        self.as_slice().last().copied()
    }

    /// Number of occurrences of `loc`.
    #[inline]
    pub fn count(&self, loc: Location) -> usize {
        self.as_slice().iter().filter(|&&l| l == loc).count()
    }

    #[inline]
    pub fn contains(&self, loc: Location) -> bool {
        self.as_slice().binary_search(&loc).is_ok()
    }

    /// The tuple with one occurrence of `loc` removed, if present.
    pub fn remove_one(&self, loc: Location) -> Option<TensorIndex> {
        let pos = self.as_slice().binary_search(&loc).ok()?;
        let mut out = *self;
        out.locs.copy_within(pos + 1..self.len as usize, pos);
        out.len -= 1;
        out.locs[out.len as usize] = 0;
        Some(out)
    }

    /// The tuple with every occurrence of `loc` removed.
    pub fn remove_all(&self, loc: Location) -> TensorIndex {
        let mut out = TensorIndex::EMPTY;
        for &l in self.as_slice() {
            if l != loc {
                out.locs[out.len as usize] = l;
                out.len += 1;
            }
        }
        out
    }

    /// The tuple with `times` extra copies of `loc`, re-canonicalized.
    ///
    /// Panics if the result would exceed [`MAX_ORDER`].
    pub fn with_repeated(&self, loc: Location, times: usize) -> TensorIndex {
        let n = self.len as usize;
        assert!(
            n + times <= MAX_ORDER,
            "tensor index rank {} exceeds maximum {}",
            n + times,
            MAX_ORDER
        );
        if times == 0 {
            return *self;
        }
        let at = self.as_slice().partition_point(|&l| l <= loc);
        let mut out = *self;
        out.locs.copy_within(at..n, at + times);
        out.locs[at..at + times].fill(loc);
        out.len = (n + times) as u8;
        out
    }

    /// Number of distinct orderings of this tuple (`rank! / Π count!`).
    #[inline]
    pub fn permutations(&self) -> u64 {
        multiset_permutations(self.as_slice())
    }
}

/// Distinct orderings of a sorted multiset.
pub(crate) fn multiset_permutations<T: PartialEq>(sorted: &[T]) -> u64 {
    let mut total = factorial(sorted.len());
    let mut i = 0;
    while i < sorted.len() {
        let j = i + sorted[i..].iter().take_while(|&l| *l == sorted[i]).count();
        total /= factorial(j - i);
        i = j;
    }
    total
}

#[inline]
pub(crate) fn factorial(n: usize) -> u64 {
    (1..=n as u64).product()
}

impl PartialEq for TensorIndex {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for TensorIndex {}

impl Hash for TensorIndex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl PartialOrd for TensorIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TensorIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl fmt::Debug for TensorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TensorIndex").field(&self.as_slice()).finish()
    }
}

/// Storage key ordering tuples colexicographically: last slot compared first.
///
/// Within one rank, all entries whose largest location is `l` are contiguous
/// and sort after every entry whose largest location is below `l`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct ColexKey(pub(crate) TensorIndex);

impl PartialOrd for ColexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ColexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .as_slice()
            .iter()
            .rev()
            .cmp(other.0.as_slice().iter().rev())
            .then(self.0.len.cmp(&other.0.len))
    }
}

impl ColexKey {
    /// Smallest rank-`rank` key whose largest location is `loc`.
    pub(crate) fn lower_bound(rank: usize, loc: Location) -> ColexKey {
        debug_assert!(rank >= 1);
        let mut idx = TensorIndex::EMPTY;
        idx.len = rank as u8;
        idx.locs[rank - 1] = loc;
        ColexKey(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_order() {
        let a = TensorIndex::new(&[5, 1, 3]);
        let b = TensorIndex::new(&[3, 5, 1]);
        assert_eq!(a, b);
        assert_eq!(a.as_slice(), &[1, 3, 5]);
        assert_eq!(a.last(), Some(5));
    }

    #[test]
    fn remove_and_repeat() {
        let a = TensorIndex::new(&[2, 7, 7, 9]);
        assert_eq!(a.remove_one(7).map(|i| i.as_slice().to_vec()), Some(vec![2, 7, 9]));
        assert_eq!(a.remove_one(4), None);
        assert_eq!(a.remove_all(7).as_slice(), &[2, 9]);
        assert_eq!(a.with_repeated(3, 2).as_slice(), &[2, 3, 3, 7, 7, 9]);
        assert_eq!(a.with_repeated(9, 1).as_slice(), &[2, 7, 7, 9, 9]);
        assert_eq!(a.count(7), 2);
    }

    #[test]
    fn permutation_counts() {
        assert_eq!(TensorIndex::EMPTY.permutations(), 1);
        assert_eq!(TensorIndex::new(&[1, 1, 1]).permutations(), 1);
        assert_eq!(TensorIndex::new(&[1, 2, 2]).permutations(), 3);
        assert_eq!(TensorIndex::new(&[1, 2, 3]).permutations(), 6);
    }

    #[test]
    fn colex_groups_by_largest_location() {
        let mut keys: Vec<ColexKey> = [[0, 9], [3, 4], [1, 9], [4, 4], [2, 3]]
            .iter()
            .map(|l| ColexKey(TensorIndex::new(l)))
            .collect();
        keys.sort();
        let sorted: Vec<Vec<u32>> = keys.iter().map(|k| k.0.as_slice().to_vec()).collect();
        assert_eq!(sorted, vec![vec![2, 3], vec![3, 4], vec![4, 4], vec![0, 9], vec![1, 9]]);
        assert!(ColexKey::lower_bound(2, 9) <= keys[3]);
        assert!(ColexKey::lower_bound(2, 9) > keys[2]);
    }
}
