use crate::bits::{BitPattern, gbit, popcnt};
use crate::combinatorics::{ConfigSpace, binomial};

/// Dense ranking of the `k`-particle patterns on `n` sites.
///
/// The rank of a pattern with set bits `c_0 < c_1 < … < c_{k-1}` is
/// `Σ_i C(c_i, i + 1)`, which is exactly its position in
/// [`Combinations`](super::Combinations).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinTable {
    n: usize,
    k: usize,
    len: usize,
    /// `table[c * (k + 1) + i] = C(c, i)`
    table: Vec<usize>,
}

impl LinTable {
    pub fn new(n: usize, k: usize) -> Self {
        let width = k + 1;
        let mut table = vec![0usize; (n + 1) * width];
        for c in 0..=n {
            for i in 0..=k {
                table[c * width + i] = binomial(c, i);
            }
        }
        Self {
            n,
            k,
            len: binomial(n, k),
            table,
        }
    }

    pub fn n_sites(&self) -> usize {
        self.n
    }

    pub fn n_particles(&self) -> usize {
        self.k
    }

    #[inline]
    fn choose(&self, c: usize, i: usize) -> usize {
        self.table[c * (self.k + 1) + i]
    }

    /// Rank of `pattern`; see [`ConfigSpace::rank_of`].
    #[inline]
    pub fn index<B: BitPattern>(&self, pattern: B) -> usize {
        debug_assert_eq!(popcnt(pattern), self.k, "pattern outside the sector");
        let mut idx = 0;
        let mut i = 1;
        let mut rest = pattern;
        while rest != B::zero() {
            let c = rest.trailing_zeros() as usize;
            idx += self.choose(c, i);
            i += 1;
            rest = rest & (rest - B::one());
        }
        idx
    }

    /// Pattern at rank `index`; see [`ConfigSpace::pattern_of`].
    pub fn pattern<B: BitPattern>(&self, index: usize) -> B {
        debug_assert!(index < self.len);
        let mut out = B::zero();
        let mut rest = index;
        let mut c = self.n;
        for i in (1..=self.k).rev() {
            // largest c with C(c, i) <= rest
            c -= 1;
            while self.choose(c, i) > rest {
                c -= 1;
            }
            rest -= self.choose(c, i);
            out = out | (B::one() << c);
        }
        debug_assert!((0..self.n).filter(|&s| gbit(out, s)).count() == self.k);
        out
    }
}

impl<B: BitPattern> ConfigSpace<B> for LinTable {
    fn len(&self) -> usize {
        self.len
    }

    fn rank_of(&self, pattern: B) -> usize {
        self.index(pattern)
    }

    fn pattern_of(&self, index: usize) -> B {
        self.pattern(index)
    }
}
