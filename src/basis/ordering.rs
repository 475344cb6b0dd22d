//! One rank's share of a sector, laid out by a major sub-lattice.

use crate::algs::ownership::Ownership;
use crate::basis_error::BasisError;
use crate::bits::BitPattern;
use crate::debug_invariants::DebugInvariants;
use crate::sector::{ProductSector, Sublattice};
use hashbrown::HashMap;

/// Locally owned heads of one ordering and the dense offset of each block.
///
/// Heads appear in ascending order; the block of `heads[k]` covers local
/// indices `block_start[k]..block_start[k + 1]`, its partners in ascending
/// order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalOrdering<B: BitPattern> {
    major: Sublattice,
    heads: Vec<B>,
    block_start: Vec<usize>,
    head_pos: HashMap<B, usize>,
}

impl<B: BitPattern> LocalOrdering<B> {
    /// Keep the heads `ownership` assigns to `rank`. Pure: no communication.
    pub fn build<S>(sector: &S, major: Sublattice, ownership: &Ownership, rank: usize) -> Self
    where
        S: ProductSector<Bits = B>,
    {
        let mut heads = Vec::new();
        let mut block_start = vec![0usize];
        let mut offset = 0usize;
        for head in sector.heads(major) {
            if ownership.rank_of(head) != rank {
                continue;
            }
            offset += sector.block_len(major, head);
            heads.push(head);
            block_start.push(offset);
        }
        let head_pos = heads.iter().enumerate().map(|(k, &h)| (h, k)).collect();
        Self {
            major,
            heads,
            block_start,
            head_pos,
        }
    }

    /// Per-rank sizes this ordering would have on `ownership.n_ranks()` ranks.
    pub fn load_profile<S>(sector: &S, major: Sublattice, ownership: &Ownership) -> Vec<usize>
    where
        S: ProductSector<Bits = B>,
    {
        let mut sizes = vec![0usize; ownership.n_ranks()];
        for head in sector.heads(major) {
            sizes[ownership.rank_of(head)] += sector.block_len(major, head);
        }
        sizes
    }

    pub fn major(&self) -> Sublattice {
        self.major
    }

    /// Number of local coefficients.
    pub fn len(&self) -> usize {
        self.block_start.last().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn heads(&self) -> &[B] {
        &self.heads
    }

    /// Local index range of the block headed by `head`, if owned here.
    pub fn block(&self, head: B) -> Option<std::ops::Range<usize>> {
        let &k = self.head_pos.get(&head)?;
        Some(self.block_start[k]..self.block_start[k + 1])
    }

    /// Local index of `(head, partner)`. The pair must belong to the sector.
    pub fn index_of<S>(&self, sector: &S, head: B, partner: B) -> Option<usize>
    where
        S: ProductSector<Bits = B>,
    {
        let &k = self.head_pos.get(&head)?;
        Some(self.block_start[k] + sector.partner_index(self.major, head, partner))
    }

    /// Call `f(block_start, head, partners)` for every local block, in order.
    pub fn for_each_block<S, F>(&self, sector: &S, mut f: F)
    where
        S: ProductSector<Bits = B>,
        F: FnMut(usize, B, &[B]),
    {
        let mut partners = Vec::new();
        for (&head, &start) in self.heads.iter().zip(&self.block_start) {
            partners.clear();
            sector.extend_partners(self.major, head, &mut partners);
            f(start, head, &partners);
        }
    }

    /// Call `f(index, head, partner)` for every local pair, index ascending.
    pub fn for_each<S, F>(&self, sector: &S, mut f: F)
    where
        S: ProductSector<Bits = B>,
        F: FnMut(usize, B, B),
    {
        self.for_each_block(sector, |start, head, partners| {
            for (j, &p) in partners.iter().enumerate() {
                f(start + j, head, p);
            }
        });
    }

    /// Iterator form of [`for_each`](Self::for_each).
    pub fn iter<'a, S>(&'a self, sector: &'a S) -> impl Iterator<Item = (usize, B, B)> + 'a
    where
        S: ProductSector<Bits = B>,
    {
        let major = self.major;
        self.heads
            .iter()
            .zip(&self.block_start)
            .flat_map(move |(&head, &start)| {
                let mut partners = Vec::new();
                sector.extend_partners(major, head, &mut partners);
                partners
                    .into_iter()
                    .enumerate()
                    .map(move |(j, p)| (start + j, head, p))
            })
    }
}

impl<B: BitPattern> DebugInvariants for LocalOrdering<B> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "LocalOrdering");
    }

    fn validate_invariants(&self) -> Result<(), BasisError> {
        let broken = |what: &str| BasisError::InvalidSector(format!("ordering invariant: {what}"));
        if self.block_start.len() != self.heads.len() + 1 || self.block_start[0] != 0 {
            return Err(broken("block_start must have one entry per head plus one, starting at 0"));
        }
        if self.block_start.windows(2).any(|w| w[0] > w[1]) {
            return Err(broken("block offsets must be non-decreasing"));
        }
        if self.heads.windows(2).any(|w| w[0] >= w[1]) {
            return Err(broken("heads must be strictly ascending"));
        }
        if self.head_pos.len() != self.heads.len() {
            return Err(broken("head lookup out of sync with heads"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::{ElectronSector, SpinhalfSector};

    #[test]
    fn ranks_cover_the_sector() {
        let s = ElectronSector::<u32>::new(6, 3, 2).unwrap();
        for n_ranks in [1, 3, 5] {
            let own = Ownership::new(n_ranks);
            for major in [Sublattice::Up, Sublattice::Dn] {
                let total: usize = (0..n_ranks)
                    .map(|r| LocalOrdering::build(&s, major, &own, r).len())
                    .sum();
                assert_eq!(total, s.dim());
                let profile = LocalOrdering::load_profile(&s, major, &own);
                for (r, &n) in profile.iter().enumerate() {
                    assert_eq!(LocalOrdering::build(&s, major, &own, r).len(), n);
                }
            }
        }
    }

    #[test]
    fn index_matches_iteration() {
        let s = SpinhalfSector::<u16>::new(8, 3).unwrap();
        let own = Ownership::new(2);
        let ord = LocalOrdering::build(&s, Sublattice::Up, &own, 1);
        ord.validate_invariants().unwrap();
        let mut seen = 0;
        ord.for_each(&s, |i, up, dn| {
            assert_eq!(ord.index_of(&s, up, dn), Some(i));
            assert_eq!(i, seen);
            seen += 1;
        });
        assert_eq!(seen, ord.len());
        assert_eq!(ord.iter(&s).count(), ord.len());
    }
}
