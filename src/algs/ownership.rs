//! Content-based ownership: which rank stores a configuration.
//!
//! Both orderings of a partition call the same function on their head
//! configuration, so every rank can route a pair without any lookup table.

use crate::bits::BitPattern;

/// Murmur3 64-bit finalizer: full avalanche on every input bit.
#[inline]
pub fn fmix64(mut h: u64) -> u64 {
    h ^= h >> 33;
    h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^= h >> 33;
    h
}

/// Pure map from a configuration to its owning rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ownership {
    n_ranks: usize,
}

impl Ownership {
    /// `n_ranks` of zero is treated as one.
    pub fn new(n_ranks: usize) -> Self {
        Self {
            n_ranks: n_ranks.max(1),
        }
    }

    pub fn n_ranks(&self) -> usize {
        self.n_ranks
    }

    #[inline]
    pub fn rank_of<B: BitPattern>(&self, config: B) -> usize {
        (fmix64(config.to_u64()) % self.n_ranks as u64) as usize
    }
}
