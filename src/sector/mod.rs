//! Quantum-number sectors of a product Hilbert space.
//!
//! A sector is the set of valid `(up, dn)` configuration pairs for fixed
//! conserved quantities. It can be laid out two ways: grouped by the up
//! configuration (forward ordering) or grouped by the dn configuration
//! (transpose ordering). A [`ProductSector`] describes both layouts in terms
//! of *heads* (the grouping configuration) and *partners* (the configurations
//! stored contiguously inside a head's block).

pub mod electron;
pub mod spinhalf;
pub mod tj;

pub use electron::ElectronSector;
pub use spinhalf::SpinhalfSector;
pub use tj::TjSector;

use crate::basis_error::BasisError;
use crate::bits::BitPattern;
use crate::config::SectorConfig;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One of the two sub-lattices of a product configuration.
///
/// For the spin-½ prefix/postfix split, `Up` is the prefix (high sites) and
/// `Dn` the postfix (low sites).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sublattice {
    Up,
    Dn,
}

impl Sublattice {
    pub fn other(self) -> Self {
        match self {
            Sublattice::Up => Sublattice::Dn,
            Sublattice::Dn => Sublattice::Up,
        }
    }
}

/// Product space of up × dn configurations with fixed quantum numbers.
///
/// `major` selects the layout: `Up` for the forward ordering, `Dn` for the
/// transpose ordering. Heads and partners are always produced in ascending
/// numeric order so that every rank derives identical layouts.
pub trait ProductSector: Clone + Debug + Send + Sync {
    type Bits: BitPattern;

    fn n_sites(&self) -> usize;

    /// Closed-form number of valid pairs.
    fn dim(&self) -> usize;

    /// Every configuration of `major` that heads a non-empty block, ascending.
    fn heads(&self, major: Sublattice) -> Box<dyn Iterator<Item = Self::Bits> + '_>;

    /// Number of partners of `head`.
    fn block_len(&self, major: Sublattice, head: Self::Bits) -> usize;

    /// Append the partners of `head` to `out`, ascending.
    fn extend_partners(&self, major: Sublattice, head: Self::Bits, out: &mut Vec<Self::Bits>);

    /// Position of `partner` inside the block of `head`.
    fn partner_index(&self, major: Sublattice, head: Self::Bits, partner: Self::Bits) -> usize;

    /// Whether `(up, dn)` is a valid pair of this sector.
    fn contains(&self, up: Self::Bits, dn: Self::Bits) -> bool;
}

pub(crate) fn check_width<B: BitPattern>(n_sites: usize) -> Result<(), BasisError> {
    if n_sites as u32 > B::BITS {
        return Err(BasisError::SitesExceedBitWidth {
            n_sites,
            bits: B::BITS,
        });
    }
    Ok(())
}

/// Runtime choice among the supported models.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sector<B: BitPattern> {
    Electron(ElectronSector<B>),
    Tj(TjSector<B>),
    Spinhalf(SpinhalfSector<B>),
}

impl<B: BitPattern> Sector<B> {
    pub fn from_config(cfg: &SectorConfig) -> Result<Self, BasisError> {
        Ok(match *cfg {
            SectorConfig::Electron { n_sites, n_up, n_dn } => {
                Sector::Electron(ElectronSector::new(n_sites, n_up, n_dn)?)
            }
            SectorConfig::Tj { n_sites, n_up, n_dn } => Sector::Tj(TjSector::new(n_sites, n_up, n_dn)?),
            SectorConfig::Spinhalf {
                n_sites,
                n_up,
                n_prefix_bits,
            } => Sector::Spinhalf(match n_prefix_bits {
                Some(n_prefix) => SpinhalfSector::with_prefix_bits(n_sites, n_up, n_prefix)?,
                None => SpinhalfSector::new(n_sites, n_up)?,
            }),
        })
    }
}

macro_rules! dispatch {
    ($self:ident, $s:ident => $body:expr) => {
        match $self {
            Sector::Electron($s) => $body,
            Sector::Tj($s) => $body,
            Sector::Spinhalf($s) => $body,
        }
    };
}

impl<B: BitPattern> ProductSector for Sector<B> {
    type Bits = B;

    fn n_sites(&self) -> usize {
        dispatch!(self, s => s.n_sites())
    }

    fn dim(&self) -> usize {
        dispatch!(self, s => s.dim())
    }

    fn heads(&self, major: Sublattice) -> Box<dyn Iterator<Item = B> + '_> {
        dispatch!(self, s => s.heads(major))
    }

    fn block_len(&self, major: Sublattice, head: B) -> usize {
        dispatch!(self, s => s.block_len(major, head))
    }

    fn extend_partners(&self, major: Sublattice, head: B, out: &mut Vec<B>) {
        dispatch!(self, s => s.extend_partners(major, head, out))
    }

    fn partner_index(&self, major: Sublattice, head: B, partner: B) -> usize {
        dispatch!(self, s => s.partner_index(major, head, partner))
    }

    fn contains(&self, up: B, dn: B) -> bool {
        dispatch!(self, s => s.contains(up, dn))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bits::popcnt;

    /// Walk both layouts and check they enumerate the same pair set with
    /// consistent block lengths and partner ranks.
    pub(crate) fn check_layouts<S: ProductSector>(sector: &S) {
        let mut fwd = Vec::new();
        for up in sector.heads(Sublattice::Up) {
            let mut partners = Vec::new();
            sector.extend_partners(Sublattice::Up, up, &mut partners);
            assert_eq!(partners.len(), sector.block_len(Sublattice::Up, up));
            assert!(partners.windows(2).all(|w| w[0] < w[1]));
            for (i, &dn) in partners.iter().enumerate() {
                assert_eq!(sector.partner_index(Sublattice::Up, up, dn), i);
                assert!(sector.contains(up, dn));
                fwd.push((up, dn));
            }
        }
        let mut tr = Vec::new();
        for dn in sector.heads(Sublattice::Dn) {
            let mut partners = Vec::new();
            sector.extend_partners(Sublattice::Dn, dn, &mut partners);
            assert_eq!(partners.len(), sector.block_len(Sublattice::Dn, dn));
            for (i, &up) in partners.iter().enumerate() {
                assert_eq!(sector.partner_index(Sublattice::Dn, dn, up), i);
                tr.push((up, dn));
            }
        }
        assert_eq!(fwd.len(), sector.dim());
        fwd.sort_unstable();
        tr.sort_unstable();
        assert_eq!(fwd, tr);
    }

    #[test]
    fn enum_dispatch_matches_inner() {
        let cfg = SectorConfig::Tj {
            n_sites: 5,
            n_up: 2,
            n_dn: 1,
        };
        let s = Sector::<u32>::from_config(&cfg).unwrap();
        assert_eq!(s.dim(), 30);
        check_layouts(&s);
        let ups: Vec<u32> = s.heads(Sublattice::Up).collect();
        assert!(ups.iter().all(|&u| popcnt(u) == 2));
    }
}
