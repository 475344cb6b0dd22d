//! Matrix-free operators on a partitioned basis.
//!
//! An operator is a list of [`Term`]s. Each term tells
//! [`DistributedOperator`](apply::DistributedOperator) which layout it can be
//! applied in through its [`TermKind`], and acts on one `(up, dn)` pair at a
//! time.

pub mod apply;
pub mod dense;
pub mod terms;

pub use apply::{ApplyStats, DistributedOperator};
pub use dense::DenseReference;
pub use terms::{
    ChemicalPotential, Coulomb, DoubleOccupancy, DoubleOccupancyPair, Exchange, Hopping,
    HubbardU, Lower, Number, Raise, SpinExchange, SpinIsing, SzSz, fermi_sign,
};

use crate::basis_error::BasisError;
use crate::bits::BitPattern;
use crate::sector::Sublattice;
use bytemuck::Pod;
use num_complex::Complex64;
use num_traits::Zero;
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg};

/// Scalar type of vectors and matrix elements.
pub trait Coeff:
    Pod
    + Zero
    + Debug
    + PartialEq
    + Send
    + Sync
    + Add<Output = Self>
    + AddAssign
    + Mul<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    fn conj(self) -> Self;
    fn from_f64(x: f64) -> Self;
    fn scale(self, s: f64) -> Self;
    fn abs(self) -> f64;
    fn to_parts(self) -> (f64, f64);
    fn from_parts(re: f64, im: f64) -> Self;
}

impl Coeff for f64 {
    #[inline]
    fn conj(self) -> Self {
        self
    }
    #[inline]
    fn from_f64(x: f64) -> Self {
        x
    }
    #[inline]
    fn scale(self, s: f64) -> Self {
        self * s
    }
    #[inline]
    fn abs(self) -> f64 {
        f64::abs(self)
    }
    fn to_parts(self) -> (f64, f64) {
        (self, 0.0)
    }
    /// Drops the imaginary part.
    fn from_parts(re: f64, _im: f64) -> Self {
        re
    }
}

impl Coeff for Complex64 {
    #[inline]
    fn conj(self) -> Self {
        Complex64::conj(&self)
    }
    #[inline]
    fn from_f64(x: f64) -> Self {
        Complex64::new(x, 0.0)
    }
    #[inline]
    fn scale(self, s: f64) -> Self {
        self * s
    }
    #[inline]
    fn abs(self) -> f64 {
        self.norm()
    }
    fn to_parts(self) -> (f64, f64) {
        (self.re, self.im)
    }
    fn from_parts(re: f64, im: f64) -> Self {
        Complex64::new(re, im)
    }
}

/// Where a term can be applied without moving data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// Depends only on the pair itself.
    Diagonal,
    /// Changes only the given sub-lattice. `Flip(Dn)` is local in the forward
    /// ordering; `Flip(Up)` is applied in the transpose ordering.
    Flip(Sublattice),
    /// Changes both sub-lattices at once; routed through its own plan.
    Mixed,
}

/// One operator piece acting on `(up, dn)` configuration pairs.
///
/// Only the method matching [`Term::kind`] is called; the others keep their
/// empty defaults.
pub trait Term<B: BitPattern, T: Coeff>: Debug + Send + Sync {
    fn kind(&self) -> TermKind;

    /// Diagonal matrix element.
    fn diagonal(&self, _up: B, _dn: B) -> T {
        T::zero()
    }

    /// For `Flip(part)`: act on `config` of `part`, with the other
    /// sub-lattice held at `fixed`. Returns the new configuration and the
    /// matrix element.
    fn flip(&self, _fixed: B, _config: B) -> Option<(B, T)> {
        None
    }

    /// For `Mixed`: every `(up', dn', element)` reached from `(up, dn)`.
    fn act(&self, _up: B, _dn: B, _out: &mut Vec<(B, B, T)>) {}

    /// Check the sites of the term against the lattice.
    fn validate(&self, n_sites: usize) -> Result<(), BasisError>;
}

impl<B: BitPattern, T: Coeff> Term<B, T> for Box<dyn Term<B, T>> {
    fn kind(&self) -> TermKind {
        (**self).kind()
    }
    fn diagonal(&self, up: B, dn: B) -> T {
        (**self).diagonal(up, dn)
    }
    fn flip(&self, fixed: B, config: B) -> Option<(B, T)> {
        (**self).flip(fixed, config)
    }
    fn act(&self, up: B, dn: B, out: &mut Vec<(B, B, T)>) {
        (**self).act(up, dn, out)
    }
    fn validate(&self, n_sites: usize) -> Result<(), BasisError> {
        (**self).validate(n_sites)
    }
}
