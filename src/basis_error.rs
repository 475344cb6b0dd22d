//! BasisError: Unified error type for hilbert-sieve public APIs
//!
//! Every fallible operation (sector construction, partitioning, plan building,
//! transposes and operator application) reports through this type. Errors that
//! arise before the first collective are identical on every rank, so a driver
//! can bail out without leaving peers blocked in a collective.

use thiserror::Error;

/// Unified error type for hilbert-sieve operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BasisError {
    /// Quantum numbers that do not describe a valid sector.
    #[error("invalid sector: {0}")]
    InvalidSector(String),
    /// The lattice does not fit into the chosen configuration type.
    #[error("{n_sites} sites do not fit into a {bits}-bit configuration")]
    SitesExceedBitWidth { n_sites: usize, bits: u32 },
    /// Rank/size pair that cannot describe a process group.
    #[error("invalid process group: rank {rank} of size {size}")]
    InvalidGroup { rank: usize, size: usize },
    /// A partition was used with a different process group than it was built on.
    #[error("process group mismatch: partition built for rank {expected_rank}/{expected_size}, called with {found_rank}/{found_size}")]
    GroupMismatch {
        expected_rank: usize,
        expected_size: usize,
        found_rank: usize,
        found_size: usize,
    },
    /// An operator term refers to sites outside the lattice or is otherwise malformed.
    #[error("invalid term: {0}")]
    InvalidTerm(String),
    /// A vector or buffer does not have the length the partition expects.
    #[error("length mismatch for {what}: expected {expected}, found {found}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// Communication with a peer failed.
    #[error("communication error with rank {neighbor}: {message}")]
    CommError { neighbor: usize, message: String },
    /// Send/receive buffers could not be allocated.
    #[error("rank {rank}: could not allocate {requested} elements for {what}")]
    Allocation {
        rank: usize,
        requested: usize,
        what: &'static str,
    },
    /// A received configuration pair is not stored on this rank.
    #[error("rank {rank}: configuration pair ({head:#x}, {partner:#x}) is not owned locally")]
    NotOwned { rank: usize, head: u64, partner: u64 },
    /// The process group was aborted by one of its members.
    #[error("process group aborted (code {0})")]
    Aborted(i32),
}

impl BasisError {
    pub(crate) fn invalid_sector(msg: impl Into<String>) -> Self {
        BasisError::InvalidSector(msg.into())
    }
}
