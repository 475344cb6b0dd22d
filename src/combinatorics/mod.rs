//! Enumeration and ranking of fixed-particle-number configurations.
//!
//! [`Combinations`] walks all `k`-subsets of `n` sites in ascending numeric
//! order; [`LinTable`] is the matching dense rank, i.e. the position of a
//! pattern in that walk.

pub mod binomial;
pub mod combinations;
pub mod lin_table;

pub use binomial::binomial;
pub use combinations::{Combinations, Subsets};
pub use lin_table::LinTable;

use crate::bits::BitPattern;

/// Bijection between the configurations of one `(n_sites, n_particles)`
/// sector and `0..len()`.
///
/// Implementations hold no shared state and may be called independently on
/// every rank.
pub trait ConfigSpace<B: BitPattern> {
    /// Number of configurations in the space.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dense rank of `pattern`. The pattern must belong to the space.
    fn rank_of(&self, pattern: B) -> usize;

    /// Pattern at dense rank `index`. `index` must be below `len()`.
    fn pattern_of(&self, index: usize) -> B;
}
