use super::{ProductSector, Sublattice, check_width};
use crate::basis_error::BasisError;
use crate::bits::{BitPattern, low_mask, popcnt};
use crate::combinatorics::{Combinations, LinTable, binomial};
use std::marker::PhantomData;

/// Hubbard-model sector: `n_up` up electrons and `n_dn` dn electrons on
/// `n_sites` sites, with the two species independent of each other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectronSector<B: BitPattern> {
    n_sites: usize,
    n_up: usize,
    n_dn: usize,
    lintable_up: LinTable,
    lintable_dn: LinTable,
    _bits: PhantomData<B>,
}

impl<B: BitPattern> ElectronSector<B> {
    pub fn new(n_sites: usize, n_up: usize, n_dn: usize) -> Result<Self, BasisError> {
        check_width::<B>(n_sites)?;
        if n_up > n_sites || n_dn > n_sites {
            return Err(BasisError::invalid_sector(format!(
                "electron sector with n_up={n_up}, n_dn={n_dn} exceeds n_sites={n_sites}"
            )));
        }
        Ok(Self {
            n_sites,
            n_up,
            n_dn,
            lintable_up: LinTable::new(n_sites, n_up),
            lintable_dn: LinTable::new(n_sites, n_dn),
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
}

impl<B: BitPattern> ProductSector for ElectronSector<B> {
    type Bits = B;

    fn n_sites(&self) -> usize {
        self.n_sites
    }

    fn dim(&self) -> usize {
        binomial(self.n_sites, self.n_up) * binomial(self.n_sites, self.n_dn)
    }

    fn heads(&self, major: Sublattice) -> Box<dyn Iterator<Item = B> + '_> {
        Box::new(Combinations::new(self.n_sites, self.count(major)))
    }

    fn block_len(&self, major: Sublattice, _head: B) -> usize {
        binomial(self.n_sites, self.count(major.other()))
    }

    fn extend_partners(&self, major: Sublattice, _head: B, out: &mut Vec<B>) {
        out.extend(Combinations::<B>::new(self.n_sites, self.count(major.other())));
    }

    fn partner_index(&self, major: Sublattice, _head: B, partner: B) -> usize {
        match major {
            Sublattice::Up => self.lintable_dn.index(partner),
            Sublattice::Dn => self.lintable_up.index(partner),
        }
    }

    fn contains(&self, up: B, dn: B) -> bool {
        let outside = !low_mask::<B>(self.n_sites);
        popcnt(up) == self.n_up
            && popcnt(dn) == self.n_dn
            && (up & outside) == B::zero()
            && (dn & outside) == B::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::tests::check_layouts;

    #[test]
    fn layouts_agree() {
        for n in 0..=6 {
            for n_up in 0..=n {
                for n_dn in 0..=n {
                    check_layouts(&ElectronSector::<u16>::new(n, n_up, n_dn).unwrap());
                }
            }
        }
    }

    #[test]
    fn rejects_overfull_sector() {
        assert!(matches!(
            ElectronSector::<u32>::new(4, 5, 0),
            Err(BasisError::InvalidSector(_))
        ));
        assert!(matches!(
            ElectronSector::<u16>::new(17, 1, 1),
            Err(BasisError::SitesExceedBitWidth { n_sites: 17, bits: 16 })
        ));
    }
}
