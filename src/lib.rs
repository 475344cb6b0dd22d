#![cfg_attr(docsrs, feature(doc_cfg))]
//! # hilbert-sieve
//!
//! hilbert-sieve distributes the basis of a many-body Hilbert space over a
//! group of ranks and moves coefficient vectors between the two layouts a
//! matrix-free Hamiltonian apply needs. Every basis state is a pair
//! `(up, dn)` of bit patterns; the sectors cover spin-½ chains, the Hubbard
//! model and the t-J model.
//!
//! ## Features
//! - Particle-number sectors with closed-form dimensions and colex ranking
//! - Hash ownership of sub-lattice configurations, so every rank derives the
//!   partition without talking to the others
//! - Forward (up-major) and transpose (dn-major) orderings with cached
//!   all-to-all plans between them
//! - A distributed operator that applies diagonal and single-species terms
//!   locally and pays for one transpose round trip only when needed
//! - Pluggable process groups: single rank, in-process threads, MPI
//!
//! ## Determinism
//!
//! Ownership depends only on configuration bits, never on rank-local state.
//! Partitions, plans and apply results are bitwise identical between runs
//! with the same rank count.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! hilbert-sieve = "0.1"
//! # features = ["mpi-support"]
//! ```
//!
//! ```
//! use hilbert_sieve::prelude::*;
//!
//! let sector = ElectronSector::<u32>::new(4, 2, 2).unwrap();
//! let part = BasisPartition::new(sector, &NoComm).unwrap();
//! assert_eq!(part.dim(), 36);
//! ```

pub mod algs;
pub mod basis;
pub mod basis_error;
pub mod bits;
pub mod combinatorics;
pub mod config;
pub mod debug_invariants;
pub mod operator;
pub mod sector;

pub use basis_error::BasisError;
pub use debug_invariants::DebugInvariants;

/// The most-used traits and types.
pub mod prelude {
    pub use crate::algs::collective::{BlockLayout, ProcessGroup};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::communicator::{CommTag, NoComm, ThreadComm};
    pub use crate::algs::ownership::Ownership;
    pub use crate::basis::{BasisPartition, CommPlan, LocalOrdering, TransposeBuffers};
    pub use crate::basis_error::BasisError;
    pub use crate::bits::BitPattern;
    pub use crate::config::{PartitionConfig, SectorConfig};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::operator::{
        ApplyStats, ChemicalPotential, Coeff, Coulomb, DenseReference, DistributedOperator,
        DoubleOccupancy, DoubleOccupancyPair, Exchange, Hopping, HubbardU, Lower, Number, Raise,
        SpinExchange, SpinIsing, SzSz, Term, TermKind,
    };
    pub use crate::sector::{
        ElectronSector, ProductSector, Sector, SpinhalfSector, Sublattice, TjSector,
    };
}
