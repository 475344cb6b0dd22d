use super::{ProductSector, Sublattice, check_width};
use crate::basis_error::BasisError;
use crate::bits::{BitPattern, deposit, extract, low_mask, popcnt};
use crate::combinatorics::{Combinations, LinTable, binomial};
use std::marker::PhantomData;

/// t-J sector: `n_up` up and `n_dn` dn electrons on `n_sites` sites with no
/// doubly occupied site.
///
/// The partners of a head live on the sites the head leaves empty; they are
/// ranked after compressing them onto those sites.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TjSector<B: BitPattern> {
    n_sites: usize,
    n_up: usize,
    n_dn: usize,
    sites_mask: B,
    /// dn partners compressed onto the `n_sites - n_up` free sites
    lintable_dncs: LinTable,
    /// up partners compressed onto the `n_sites - n_dn` free sites
    lintable_upcs: LinTable,
    _bits: PhantomData<B>,
}

impl<B: BitPattern> TjSector<B> {
    pub fn new(n_sites: usize, n_up: usize, n_dn: usize) -> Result<Self, BasisError> {
        check_width::<B>(n_sites)?;
        if n_up + n_dn > n_sites {
            return Err(BasisError::invalid_sector(format!(
                "t-J sector with n_up + n_dn = {} exceeds n_sites={n_sites}",
                n_up + n_dn
            )));
        }
        Ok(Self {
            n_sites,
            n_up,
            n_dn,
            sites_mask: low_mask::<B>(n_sites),
            lintable_dncs: LinTable::new(n_sites - n_up, n_dn),
            lintable_upcs: LinTable::new(n_sites - n_dn, n_up),
            _bits: PhantomData,
        })
    }

    pub fn n_up(&self) -> usize {
        self.n_up
    }

    pub fn n_dn(&self) -> usize {
        self.n_dn
    }

    fn count(&self, part: Sublattice) -> usize {
        match part {
            Sublattice::Up => self.n_up,
            Sublattice::Dn => self.n_dn,
        }
    }

    #[inline]
    fn free_sites(&self, head: B) -> B {
        !head & self.sites_mask
    }
}

impl<B: BitPattern> ProductSector for TjSector<B> {
    type Bits = B;

    fn n_sites(&self) -> usize {
        self.n_sites
    }

    fn dim(&self) -> usize {
        binomial(self.n_sites, self.n_up) * binomial(self.n_sites - self.n_up, self.n_dn)
    }

    fn heads(&self, major: Sublattice) -> Box<dyn Iterator<Item = B> + '_> {
        Box::new(Combinations::new(self.n_sites, self.count(major)))
    }

    fn block_len(&self, major: Sublattice, _head: B) -> usize {
        binomial(self.n_sites - self.count(major), self.count(major.other()))
    }

    fn extend_partners(&self, major: Sublattice, head: B, out: &mut Vec<B>) {
        let free = self.free_sites(head);
        let n_free = self.n_sites - self.count(major);
        out.extend(
            Combinations::<B>::new(n_free, self.count(major.other())).map(|c| deposit(c, free)),
        );
    }

    fn partner_index(&self, major: Sublattice, head: B, partner: B) -> usize {
        let compressed = extract(partner, self.free_sites(head));
        match major {
            Sublattice::Up => self.lintable_dncs.index(compressed),
            Sublattice::Dn => self.lintable_upcs.index(compressed),
        }
    }

    fn contains(&self, up: B, dn: B) -> bool {
        popcnt(up) == self.n_up
            && popcnt(dn) == self.n_dn
            && (up & dn) == B::zero()
            && ((up | dn) & !self.sites_mask) == B::zero()
    }
}
