//! Sparse symmetric tensor store.
//!
//! [`SymmetricTensor`] maps canonical index tuples to coefficients;
//! [`TensorBundle`] groups ranks `0..=K` for one dependent. Both are the
//! working set of the reverse sweep.

mod bundle;
mod index;
mod symmetric;

pub use bundle::TensorBundle;
pub(crate) use index::{factorial, multiset_permutations};
pub use index::TensorIndex;
pub use symmetric::{Entries, SymmetricTensor};
