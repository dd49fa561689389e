use std::collections::BTreeMap;

use crate::trace::Location;

/// Location → dependents whose sensitivity currently sits at that location.
#[derive(Clone, Debug, Default)]
pub struct LiveSet {
    map: BTreeMap<Location, Vec<usize>>,
}

impl LiveSet {
    pub fn new() -> Self {
        LiveSet {
            map: BTreeMap::new(),
        }
    }

    /// Mark `loc` live for `dep`. Idempotent.
    pub fn insert(&mut self, loc: Location, dep: usize) {
        let deps = self.map.entry(loc).or_default();
        if let Err(pos) = deps.binary_search(&dep) {
            deps.insert(pos, dep);
        }
    }

    /// Remove `loc` and return its dependents (ascending), if it was live.
    #[inline]
    pub fn take(&mut self, loc: Location) -> Option<Vec<usize>> {
        self.map.remove(&loc)
    }

    #[inline]
    pub fn contains(&self, loc: Location) -> bool {
        self.map.contains_key(&loc)
    }

    /// Dependents live at `loc`.
    pub fn dependents(&self, loc: Location) -> &[usize] {
        self.map.get(&loc).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Live locations in ascending order.
    pub fn locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.map.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_take() {
        let mut live = LiveSet::new();
        live.insert(4, 1);
        live.insert(4, 0);
        live.insert(4, 1);
        live.insert(2, 0);
        assert_eq!(live.dependents(4), &[0, 1]);
        assert_eq!(live.locations().collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(live.take(4), Some(vec![0, 1]));
        assert_eq!(live.take(4), None);
        assert!(live.contains(2));
        assert_eq!(live.len(), 1);
    }
}
