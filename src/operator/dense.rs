//! Serial dense reference for small sectors.
//!
//! Enumerates the whole sector in forward order on one rank and assembles
//! `⟨dst|H|src⟩` term by term. Used to cross-check the distributed apply.

use super::{Coeff, Term, TermKind};
use crate::basis::try_filled;
use crate::basis_error::BasisError;
use crate::bits::BitPattern;
use crate::sector::{ProductSector, Sublattice};
use hashbrown::HashMap;

#[derive(Clone, Debug)]
pub struct DenseReference<B: BitPattern, T> {
    /// column basis
    basis: Vec<(B, B)>,
    index: HashMap<(B, B), usize>,
    /// row basis
    basis_out: Vec<(B, B)>,
    index_out: HashMap<(B, B), usize>,
    /// row-major, `matrix[row * dim + col]`
    matrix: Vec<T>,
}

fn enumerate<S: ProductSector>(sector: &S) -> Vec<(S::Bits, S::Bits)> {
    let mut basis = Vec::with_capacity(sector.dim());
    let mut partners = Vec::new();
    for up in sector.heads(Sublattice::Up) {
        partners.clear();
        sector.extend_partners(Sublattice::Up, up, &mut partners);
        basis.extend(partners.iter().map(|&dn| (up, dn)));
    }
    basis
}

impl<B: BitPattern, T: Coeff> DenseReference<B, T> {
    pub fn new<S, H>(sector: &S, terms: &[H]) -> Result<Self, BasisError>
    where
        S: ProductSector<Bits = B>,
        H: Term<B, T>,
    {
        Self::between(sector, sector, terms)
    }

    /// Rectangular matrix from `sector` (columns) to `sector_out` (rows).
    pub fn between<S1, S2, H>(sector: &S1, sector_out: &S2, terms: &[H]) -> Result<Self, BasisError>
    where
        S1: ProductSector<Bits = B>,
        S2: ProductSector<Bits = B>,
        H: Term<B, T>,
    {
        for term in terms {
            term.validate(sector.n_sites())?;
        }
        let basis = enumerate(sector);
        let basis_out = enumerate(sector_out);
        let index: HashMap<_, _> = basis.iter().enumerate().map(|(i, &p)| (p, i)).collect();
        let index_out: HashMap<_, _> =
            basis_out.iter().enumerate().map(|(i, &p)| (p, i)).collect();
        let (cols, rows) = (basis.len(), basis_out.len());
        let n = cols.checked_mul(rows).ok_or(BasisError::Allocation {
            rank: 0,
            requested: usize::MAX,
            what: "dense matrix",
        })?;
        let mut matrix = try_filled(n, T::zero(), 0, "dense matrix")?;

        let mut out = Vec::new();
        for (col, &(up, dn)) in basis.iter().enumerate() {
            for term in terms {
                out.clear();
                match term.kind() {
                    TermKind::Diagonal => out.push((up, dn, term.diagonal(up, dn))),
                    TermKind::Flip(Sublattice::Dn) => {
                        if let Some((dn2, c)) = term.flip(up, dn) {
                            out.push((up, dn2, c));
                        }
                    }
                    TermKind::Flip(Sublattice::Up) => {
                        if let Some((up2, c)) = term.flip(dn, up) {
                            out.push((up2, dn, c));
                        }
                    }
                    TermKind::Mixed => term.act(up, dn, &mut out),
                }
                for &(up2, dn2, c) in &out {
                    if let Some(&row) = index_out.get(&(up2, dn2)) {
                        matrix[row * cols + col] += c;
                    }
                }
            }
        }
        log::debug!("dense reference: {rows}x{cols}, {} terms", terms.len());
        Ok(Self {
            basis,
            index,
            basis_out,
            index_out,
            matrix,
        })
    }

    /// Number of columns.
    pub fn dim(&self) -> usize {
        self.basis.len()
    }

    /// Number of rows.
    pub fn dim_out(&self) -> usize {
        self.basis_out.len()
    }

    /// Column pairs in forward order: up ascending, dn ascending inside.
    pub fn basis(&self) -> &[(B, B)] {
        &self.basis
    }

    pub fn basis_out(&self) -> &[(B, B)] {
        &self.basis_out
    }

    pub fn index_of(&self, up: B, dn: B) -> Option<usize> {
        self.index.get(&(up, dn)).copied()
    }

    pub fn index_of_out(&self, up: B, dn: B) -> Option<usize> {
        self.index_out.get(&(up, dn)).copied()
    }

    /// `⟨basis_out[row]| H |basis[col]⟩`.
    pub fn element(&self, row: usize, col: usize) -> T {
        self.matrix[row * self.dim() + col]
    }

    pub fn matvec(&self, x: &[T]) -> Result<Vec<T>, BasisError> {
        let cols = self.dim();
        if x.len() != cols {
            return Err(BasisError::LengthMismatch {
                what: "dense matvec input",
                expected: cols,
                found: x.len(),
            });
        }
        if cols == 0 {
            return Ok(vec![T::zero(); self.dim_out()]);
        }
        Ok(self
            .matrix
            .chunks_exact(cols)
            .map(|row| {
                row.iter()
                    .zip(x)
                    .fold(T::zero(), |acc, (&a, &b)| acc + a * b)
            })
            .collect())
    }

    /// False for a map between different sectors.
    pub fn is_hermitian(&self, tol: f64) -> bool {
        if self.basis != self.basis_out {
            return false;
        }
        let dim = self.dim();
        (0..dim).all(|i| {
            (i..dim).all(|j| (self.element(i, j) + -self.element(j, i).conj()).abs() <= tol)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{Exchange, Hopping, HubbardU, Raise, SpinExchange, SpinIsing, SzSz};
    use crate::sector::{ElectronSector, SpinhalfSector};
    use num_complex::Complex64;

    #[test]
    fn hubbard_dimer_matrix() {
        let s = ElectronSector::<u16>::new(2, 1, 1).unwrap();
        let terms: Vec<Box<dyn Term<u16, f64>>> = vec![
            Box::new(HubbardU { u: 2.0 }),
            Box::new(Hopping::new(Sublattice::Up, 0, 1, 1.0)),
            Box::new(Hopping::new(Sublattice::Dn, 0, 1, 1.0)),
        ];
        let h = DenseReference::<u16, f64>::new(&s, &terms).unwrap();
        assert_eq!(h.dim(), 4);
        assert!(h.is_hermitian(0.0));
        let d = h.index_of(0b01, 0b01).unwrap();
        assert_eq!(h.element(d, d), 2.0);
        let trace: f64 = (0..4).map(|i| h.element(i, i)).sum();
        assert_eq!(trace, 4.0);
    }

    #[test]
    fn complex_hopping_is_hermitian() {
        let s = ElectronSector::<u32>::new(4, 2, 1).unwrap();
        let t = Complex64::new(0.5, -0.25);
        let terms: Vec<Box<dyn Term<u32, Complex64>>> = vec![
            Box::new(Hopping::new(Sublattice::Up, 0, 3, t)),
            Box::new(Hopping::new(Sublattice::Dn, 1, 2, t)),
            Box::new(Exchange::new(0, 2, Complex64::new(1.0, -0.5))),
            Box::new(SzSz { s1: 0, s2: 2, j: 1.0 }),
        ];
        let h = DenseReference::<u32, Complex64>::new(&s, &terms).unwrap();
        assert!(h.is_hermitian(1e-14));
    }

    #[test]
    fn raise_between_sectors() {
        // vacuum -> one up electron on two sites
        let s0 = ElectronSector::<u16>::new(2, 0, 0).unwrap();
        let s1 = ElectronSector::<u16>::new(2, 1, 0).unwrap();
        let terms = [Raise::new(Sublattice::Up, 1, 2.0f64)];
        let h = DenseReference::<u16, f64>::between(&s0, &s1, &terms).unwrap();
        assert_eq!((h.dim_out(), h.dim()), (2, 1));
        assert!(!h.is_hermitian(1.0));
        let y = h.matvec(&[1.0]).unwrap();
        assert_eq!(y[h.index_of_out(0b10, 0).unwrap()], 2.0);
        assert_eq!(y[h.index_of_out(0b01, 0).unwrap()], 0.0);
    }

    #[test]
    fn heisenberg_dimer_singlet() {
        // J S1.S2 on two spins: eigenvalues -3/4 (singlet) and 1/4 (triplet)
        let s = SpinhalfSector::<u16>::with_prefix_bits(2, 1, 1).unwrap();
        let terms: Vec<Box<dyn Term<u16, f64>>> = vec![
            Box::new(SpinIsing::on(&s, 0, 1, 1.0)),
            Box::new(SpinExchange::on(&s, 0, 1, 1.0)),
        ];
        let h = DenseReference::<u16, f64>::new(&s, &terms).unwrap();
        assert_eq!(h.dim(), 2);
        let a = h.index_of(0b1, 0b0).unwrap();
        let b = h.index_of(0b0, 0b1).unwrap();
        let mut singlet = vec![0.0; 2];
        singlet[a] = 1.0;
        singlet[b] = -1.0;
        let y = h.matvec(&singlet).unwrap();
        assert!((y[a] + 0.75).abs() < 1e-14);
        assert!((y[b] - 0.75).abs() < 1e-14);
    }
}
