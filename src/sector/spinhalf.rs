use super::{ProductSector, Sublattice, check_width};
use crate::basis_error::BasisError;
use crate::bits::{BitPattern, gbits, low_mask, popcnt};
use crate::combinatorics::{Combinations, LinTable, Subsets, binomial};
use std::marker::PhantomData;

/// Spin-½ sector with fixed magnetization, split into a prefix (the high
/// `n_prefix` sites, playing the `Up` role) and a postfix (the low
/// `n_postfix` sites, playing the `Dn` role).
///
/// A full configuration is `(prefix << n_postfix) | postfix`. Unlike the
/// electron models the block length depends on the head, since the number of
/// up spins left for the other half is `n_up - popcnt(head)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpinhalfSector<B: BitPattern> {
    n_sites: usize,
    n_up: usize,
    n_prefix: usize,
    n_postfix: usize,
    /// `lintables_prefix[k]` ranks the `k`-spin prefixes
    lintables_prefix: Vec<LinTable>,
    lintables_postfix: Vec<LinTable>,
    _bits: PhantomData<B>,
}

impl<B: BitPattern> SpinhalfSector<B> {
    /// Split evenly, the prefix taking `n_sites / 2` sites.
    pub fn new(n_sites: usize, n_up: usize) -> Result<Self, BasisError> {
        Self::with_prefix_bits(n_sites, n_up, n_sites / 2)
    }

    pub fn with_prefix_bits(
        n_sites: usize,
        n_up: usize,
        n_prefix: usize,
    ) -> Result<Self, BasisError> {
        check_width::<B>(n_sites)?;
        if n_up > n_sites {
            return Err(BasisError::invalid_sector(format!(
                "spin-1/2 sector with n_up={n_up} exceeds n_sites={n_sites}"
            )));
        }
        if n_prefix > n_sites {
            return Err(BasisError::invalid_sector(format!(
                "n_prefix_bits={n_prefix} exceeds n_sites={n_sites}"
            )));
        }
        let n_postfix = n_sites - n_prefix;
        Ok(Self {
            n_sites,
            n_up,
            n_prefix,
            n_postfix,
            lintables_prefix: (0..=n_prefix).map(|k| LinTable::new(n_prefix, k)).collect(),
            lintables_postfix: (0..=n_postfix).map(|k| LinTable::new(n_postfix, k)).collect(),
            _bits: PhantomData,
        })
    }

    pub fn n_up(&self) -> usize {
        self.n_up
    }

    pub fn n_prefix(&self) -> usize {
        self.n_prefix
    }

    pub fn n_postfix(&self) -> usize {
        self.n_postfix
    }

    /// Split a full configuration into `(prefix, postfix)`.
    pub fn split(&self, config: B) -> (B, B) {
        (
            gbits(config, self.n_prefix, self.n_postfix),
            config & low_mask::<B>(self.n_postfix),
        )
    }

    pub fn join(&self, prefix: B, postfix: B) -> B {
        if self.n_postfix as u32 >= B::BITS {
            return postfix;
        }
        (prefix << self.n_postfix) | postfix
    }

    fn width(&self, part: Sublattice) -> usize {
        match part {
            Sublattice::Up => self.n_prefix,
            Sublattice::Dn => self.n_postfix,
        }
    }

    /// Spins left for the other half, if the head admits any completion.
    fn remaining(&self, major: Sublattice, head: B) -> Option<usize> {
        let rest = self.n_up.checked_sub(popcnt(head))?;
        (rest <= self.width(major.other())).then_some(rest)
    }
}

impl<B: BitPattern> ProductSector for SpinhalfSector<B> {
    type Bits = B;

    fn n_sites(&self) -> usize {
        self.n_sites
    }

    fn dim(&self) -> usize {
        binomial(self.n_sites, self.n_up)
    }

    fn heads(&self, major: Sublattice) -> Box<dyn Iterator<Item = B> + '_> {
        Box::new(
            Subsets::<B>::new(self.width(major))
                .filter(move |&head| self.remaining(major, head).is_some()),
        )
    }

    fn block_len(&self, major: Sublattice, head: B) -> usize {
        self.remaining(major, head)
            .map_or(0, |rest| binomial(self.width(major.other()), rest))
    }

    fn extend_partners(&self, major: Sublattice, head: B, out: &mut Vec<B>) {
        if let Some(rest) = self.remaining(major, head) {
            out.extend(Combinations::<B>::new(self.width(major.other()), rest));
        }
    }

    fn partner_index(&self, major: Sublattice, _head: B, partner: B) -> usize {
        let k = popcnt(partner);
        match major {
            Sublattice::Up => self.lintables_postfix[k].index(partner),
            Sublattice::Dn => self.lintables_prefix[k].index(partner),
        }
    }

    fn contains(&self, up: B, dn: B) -> bool {
        (up & !low_mask::<B>(self.n_prefix)) == B::zero()
            && (dn & !low_mask::<B>(self.n_postfix)) == B::zero()
            && popcnt(up) + popcnt(dn) == self.n_up
    }
}
