//! Concrete operator terms for the electron, t-J and spin-½ models.
//!
//! Fermionic operators are ordered species-major: all up operators before all
//! dn operators, sites ascending inside each species. Under that ordering
//! every sign reduces to [`fermi_sign`] evaluated on one sub-lattice.

use super::{Coeff, Term, TermKind};
use crate::basis_error::BasisError;
use crate::bits::{BitPattern, between_mask, gbit, low_mask, popcnt};
use crate::sector::{SpinhalfSector, Sublattice};

/// `(-1)^(number of occupied sites strictly between s1 and s2)`.
#[inline]
pub fn fermi_sign<B: BitPattern>(config: B, s1: usize, s2: usize) -> f64 {
    if popcnt(config & between_mask::<B>(s1, s2)) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

#[inline]
fn site<B: BitPattern>(s: usize) -> B {
    B::one() << s
}

fn check_sites(what: &str, sites: &[usize], n_sites: usize) -> Result<(), BasisError> {
    if let Some(&s) = sites.iter().find(|&&s| s >= n_sites) {
        return Err(BasisError::InvalidTerm(format!(
            "{what}: site {s} outside lattice of {n_sites} sites"
        )));
    }
    Ok(())
}

/// For terms that move a particle or spin from one site to another.
fn check_bond(what: &str, s1: usize, s2: usize, n_sites: usize) -> Result<(), BasisError> {
    check_sites(what, &[s1, s2], n_sites)?;
    if s1 == s2 {
        return Err(BasisError::InvalidTerm(format!("{what}: both ends on site {s1}")));
    }
    Ok(())
}

/// On-site repulsion `U Σ_i n_{i↑} n_{i↓}`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HubbardU {
    pub u: f64,
}

impl<B: BitPattern, T: Coeff> Term<B, T> for HubbardU {
    fn kind(&self) -> TermKind {
        TermKind::Diagonal
    }

    fn diagonal(&self, up: B, dn: B) -> T {
        T::from_f64(self.u * popcnt(up & dn) as f64)
    }

    fn validate(&self, _n_sites: usize) -> Result<(), BasisError> {
        Ok(())
    }
}

/// Density-density interaction `V n_{s1} n_{s2}`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Coulomb {
    pub s1: usize,
    pub s2: usize,
    pub v: f64,
}

impl<B: BitPattern, T: Coeff> Term<B, T> for Coulomb {
    fn kind(&self) -> TermKind {
        TermKind::Diagonal
    }

    fn diagonal(&self, up: B, dn: B) -> T {
        let n = |s| gbit(up, s) as u8 as f64 + gbit(dn, s) as u8 as f64;
        T::from_f64(self.v * n(self.s1) * n(self.s2))
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_sites("coulomb", &[self.s1, self.s2], n_sites)
    }
}

/// `-μ n_site`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChemicalPotential {
    pub site: usize,
    pub mu: f64,
}

impl<B: BitPattern, T: Coeff> Term<B, T> for ChemicalPotential {
    fn kind(&self) -> TermKind {
        TermKind::Diagonal
    }

    fn diagonal(&self, up: B, dn: B) -> T {
        let n = gbit(up, self.site) as u8 + gbit(dn, self.site) as u8;
        T::from_f64(-self.mu * n as f64)
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_sites("chemical potential", &[self.site], n_sites)
    }
}

/// `mu n_{site,σ}` for one species.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Number {
    pub species: Sublattice,
    pub site: usize,
    pub mu: f64,
}

impl<B: BitPattern, T: Coeff> Term<B, T> for Number {
    fn kind(&self) -> TermKind {
        TermKind::Diagonal
    }

    fn diagonal(&self, up: B, dn: B) -> T {
        let config = match self.species {
            Sublattice::Up => up,
            Sublattice::Dn => dn,
        };
        T::from_f64(if gbit(config, self.site) { self.mu } else { 0.0 })
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_sites("number", &[self.site], n_sites)
    }
}

/// `u n_{site,↑} n_{site,↓}` on a single site.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DoubleOccupancy {
    pub site: usize,
    pub u: f64,
}

impl<B: BitPattern, T: Coeff> Term<B, T> for DoubleOccupancy {
    fn kind(&self) -> TermKind {
        TermKind::Diagonal
    }

    fn diagonal(&self, up: B, dn: B) -> T {
        T::from_f64(if gbit(up & dn, self.site) { self.u } else { 0.0 })
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_sites("double occupancy", &[self.site], n_sites)
    }
}

/// `v n_{s1,↑} n_{s1,↓} n_{s2,↑} n_{s2,↓}`: both sites doubly occupied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DoubleOccupancyPair {
    pub s1: usize,
    pub s2: usize,
    pub v: f64,
}

impl<B: BitPattern, T: Coeff> Term<B, T> for DoubleOccupancyPair {
    fn kind(&self) -> TermKind {
        TermKind::Diagonal
    }

    fn diagonal(&self, up: B, dn: B) -> T {
        let both = up & dn;
        T::from_f64(if gbit(both, self.s1) && gbit(both, self.s2) { self.v } else { 0.0 })
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_sites("double occupancy pair", &[self.s1, self.s2], n_sites)
    }
}

/// `J S^z_{s1} S^z_{s2}` for electrons, `S^z = (n_↑ - n_↓) / 2`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SzSz {
    pub s1: usize,
    pub s2: usize,
    pub j: f64,
}

impl<B: BitPattern, T: Coeff> Term<B, T> for SzSz {
    fn kind(&self) -> TermKind {
        TermKind::Diagonal
    }

    fn diagonal(&self, up: B, dn: B) -> T {
        let sz = |s| 0.5 * (gbit(up, s) as u8 as f64 - gbit(dn, s) as u8 as f64);
        T::from_f64(self.j * sz(self.s1) * sz(self.s2))
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_sites("szsz", &[self.s1, self.s2], n_sites)
    }
}

/// Hermitian hopping of one species:
/// `-t c†_{s1} c_{s2} - conj(t) c†_{s2} c_{s1}`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hopping<T> {
    pub species: Sublattice,
    pub s1: usize,
    pub s2: usize,
    pub t: T,
}

impl<T: Coeff> Hopping<T> {
    pub fn new(species: Sublattice, s1: usize, s2: usize, t: T) -> Self {
        Self { species, s1, s2, t }
    }
}

impl<B: BitPattern, T: Coeff> Term<B, T> for Hopping<T> {
    fn kind(&self) -> TermKind {
        TermKind::Flip(self.species)
    }

    fn flip(&self, _fixed: B, config: B) -> Option<(B, T)> {
        let (o1, o2) = (gbit(config, self.s1), gbit(config, self.s2));
        if o1 == o2 {
            return None;
        }
        let sign = fermi_sign(config, self.s1, self.s2);
        let flipped = config ^ site::<B>(self.s1) ^ site::<B>(self.s2);
        let amp = if o2 { self.t } else { self.t.conj() };
        Some((flipped, (-amp).scale(sign)))
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_bond("hopping", self.s1, self.s2, n_sites)
    }
}

/// Sign of moving a creation or annihilation operator of `species` on `site`
/// into place: past every occupied lower site of its own species and, for
/// dn, past all up electrons.
#[inline]
fn ladder_sign<B: BitPattern>(species: Sublattice, fixed: B, config: B, site: usize) -> f64 {
    let mut n = popcnt(config & low_mask::<B>(site));
    if species == Sublattice::Dn {
        n += popcnt(fixed);
    }
    if n % 2 == 0 { 1.0 } else { -1.0 }
}

/// `c · c†_{site,σ}`: adds one particle of `species`.
///
/// Maps a sector onto the one with an extra particle, so it is only useful in
/// [`DistributedOperator::between`](super::DistributedOperator::between) and
/// [`DenseReference::between`](super::DenseReference::between).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Raise<T> {
    pub species: Sublattice,
    pub site: usize,
    pub c: T,
}

impl<T: Coeff> Raise<T> {
    pub fn new(species: Sublattice, site: usize, c: T) -> Self {
        Self { species, site, c }
    }
}

impl<B: BitPattern, T: Coeff> Term<B, T> for Raise<T> {
    fn kind(&self) -> TermKind {
        TermKind::Flip(self.species)
    }

    fn flip(&self, fixed: B, config: B) -> Option<(B, T)> {
        if gbit(config, self.site) {
            return None;
        }
        let sign = ladder_sign(self.species, fixed, config, self.site);
        Some((config | site::<B>(self.site), self.c.scale(sign)))
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_sites("raise", &[self.site], n_sites)
    }
}

/// `c · c_{site,σ}`: removes one particle of `species`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lower<T> {
    pub species: Sublattice,
    pub site: usize,
    pub c: T,
}

impl<T: Coeff> Lower<T> {
    pub fn new(species: Sublattice, site: usize, c: T) -> Self {
        Self { species, site, c }
    }
}

impl<B: BitPattern, T: Coeff> Term<B, T> for Lower<T> {
    fn kind(&self) -> TermKind {
        TermKind::Flip(self.species)
    }

    fn flip(&self, fixed: B, config: B) -> Option<(B, T)> {
        if !gbit(config, self.site) {
            return None;
        }
        let sign = ladder_sign(self.species, fixed, config, self.site);
        Some((config ^ site::<B>(self.site), self.c.scale(sign)))
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_sites("lower", &[self.site], n_sites)
    }
}

/// Transverse spin exchange of electrons,
/// `J/2 S⁺_{s1} S⁻_{s2} + conj(J)/2 S⁻_{s1} S⁺_{s2}`.
///
/// Acts only where `s1` and `s2` are singly occupied by opposite spins and
/// moves both electrons, so it changes both sub-lattices. Combine with
/// [`SzSz`] for the full Heisenberg coupling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Exchange<T> {
    pub s1: usize,
    pub s2: usize,
    pub j: T,
}

impl<T: Coeff> Exchange<T> {
    pub fn new(s1: usize, s2: usize, j: T) -> Self {
        Self { s1, s2, j }
    }
}

impl<B: BitPattern, T: Coeff> Term<B, T> for Exchange<T> {
    fn kind(&self) -> TermKind {
        TermKind::Mixed
    }

    fn act(&self, up: B, dn: B, out: &mut Vec<(B, B, T)>) {
        let (u1, u2) = (gbit(up, self.s1), gbit(up, self.s2));
        let (d1, d2) = (gbit(dn, self.s1), gbit(dn, self.s2));
        // one up and one dn, on different sites
        if u1 == u2 || d1 == d2 || u1 == d1 {
            return;
        }
        let pair = site::<B>(self.s1) | site::<B>(self.s2);
        let sign = fermi_sign(up, self.s1, self.s2) * fermi_sign(dn, self.s1, self.s2);
        // up electron moves s1 -> s2 under S⁻_{s1} S⁺_{s2}
        let half = if u1 { self.j.scale(0.5) } else { self.j.conj().scale(0.5) };
        out.push((up ^ pair, dn ^ pair, half.scale(-sign)));
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_bond("exchange", self.s1, self.s2, n_sites)
    }
}

/// Where a spin-½ site lives after the prefix/postfix split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SplitSite {
    part: Sublattice,
    bit: usize,
}

impl SplitSite {
    fn new(s: usize, n_postfix: usize) -> Self {
        if s >= n_postfix {
            SplitSite {
                part: Sublattice::Up,
                bit: s - n_postfix,
            }
        } else {
            SplitSite {
                part: Sublattice::Dn,
                bit: s,
            }
        }
    }

    fn get<B: BitPattern>(self, up: B, dn: B) -> bool {
        match self.part {
            Sublattice::Up => gbit(up, self.bit),
            Sublattice::Dn => gbit(dn, self.bit),
        }
    }
}

/// `J S^z_{s1} S^z_{s2}` on a spin-½ lattice.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpinIsing {
    s1: usize,
    s2: usize,
    j: f64,
    n_postfix: usize,
}

impl SpinIsing {
    pub fn on<B: BitPattern>(sector: &SpinhalfSector<B>, s1: usize, s2: usize, j: f64) -> Self {
        Self {
            s1,
            s2,
            j,
            n_postfix: sector.n_postfix(),
        }
    }
}

impl<B: BitPattern, T: Coeff> Term<B, T> for SpinIsing {
    fn kind(&self) -> TermKind {
        TermKind::Diagonal
    }

    fn diagonal(&self, up: B, dn: B) -> T {
        let a = SplitSite::new(self.s1, self.n_postfix).get(up, dn);
        let b = SplitSite::new(self.s2, self.n_postfix).get(up, dn);
        T::from_f64(if a == b { 0.25 * self.j } else { -0.25 * self.j })
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_sites("spin ising", &[self.s1, self.s2], n_sites)
    }
}

/// `J/2 S⁺_{s1} S⁻_{s2} + conj(J)/2 S⁻_{s1} S⁺_{s2}` on a spin-½ lattice.
///
/// Local to one half when both sites share it; otherwise both halves change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpinExchange<T> {
    s1: usize,
    s2: usize,
    j: T,
    n_postfix: usize,
}

impl<T: Coeff> SpinExchange<T> {
    pub fn on<B: BitPattern>(sector: &SpinhalfSector<B>, s1: usize, s2: usize, j: T) -> Self {
        Self {
            s1,
            s2,
            j,
            n_postfix: sector.n_postfix(),
        }
    }

    fn sites(&self) -> (SplitSite, SplitSite) {
        (
            SplitSite::new(self.s1, self.n_postfix),
            SplitSite::new(self.s2, self.n_postfix),
        )
    }

    /// Element for raising `s1` (`s1` down, `s2` up) or lowering it.
    fn element(&self, s1_up: bool) -> T {
        if s1_up {
            self.j.conj().scale(0.5)
        } else {
            self.j.scale(0.5)
        }
    }
}

impl<B: BitPattern, T: Coeff> Term<B, T> for SpinExchange<T> {
    fn kind(&self) -> TermKind {
        let (a, b) = self.sites();
        if a.part == b.part {
            TermKind::Flip(a.part)
        } else {
            TermKind::Mixed
        }
    }

    fn flip(&self, _fixed: B, config: B) -> Option<(B, T)> {
        let (a, b) = self.sites();
        let (x, y) = (gbit(config, a.bit), gbit(config, b.bit));
        if x == y {
            return None;
        }
        Some((config ^ site::<B>(a.bit) ^ site::<B>(b.bit), self.element(x)))
    }

    fn act(&self, up: B, dn: B, out: &mut Vec<(B, B, T)>) {
        let (a, b) = self.sites();
        let (x, y) = (a.get(up, dn), b.get(up, dn));
        if x == y {
            return;
        }
        let (mut up2, mut dn2) = (up, dn);
        for s in [a, b] {
            match s.part {
                Sublattice::Up => up2 = up2 ^ site::<B>(s.bit),
                Sublattice::Dn => dn2 = dn2 ^ site::<B>(s.bit),
            }
        }
        out.push((up2, dn2, self.element(x)));
    }

    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        check_bond("spin exchange", self.s1, self.s2, n_sites)
    }
}
