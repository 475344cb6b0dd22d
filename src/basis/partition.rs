//! BasisPartition: one rank's view of a distributed sector.
//!
//! Construction is collective. Every rank derives its forward (up-major) and
//! transpose (dn-major) orderings from the content hash alone, agrees on the
//! global sizes, and caches the two plans that move a vector between the
//! orderings. After that the partition is immutable.

use super::comm_plan::CommPlan;
use super::ordering::LocalOrdering;
use super::transpose::{self, TransposeBuffers};
use super::try_filled;
use crate::algs::collective::{ProcessGroup, check_group};
use crate::algs::communicator::CommTag;
use crate::algs::ownership::Ownership;
use crate::basis_error::BasisError;
use crate::config::PartitionConfig;
use crate::debug_invariants::DebugInvariants;
use crate::operator::Coeff;
use crate::sector::{ProductSector, Sublattice};
use itertools::{Itertools, MinMaxResult};

const TAG_SIZES_FWD: u16 = 0;
const TAG_SIZES_TR: u16 = 1;
const TAG_PLAN_FWD: u16 = 2;
const TAG_PLAN_BWD: u16 = 4;
const TAG_TRANSPOSE: u16 = 6;
const TAG_TRANSPOSE_BACK: u16 = 7;

#[derive(Clone, Debug, PartialEq)]
pub struct BasisPartition<S: ProductSector> {
    sector: S,
    ownership: Ownership,
    config: PartitionConfig,
    rank: usize,
    n_ranks: usize,
    forward: LocalOrdering<S::Bits>,
    transpose: LocalOrdering<S::Bits>,
    dim: usize,
    size_min: usize,
    size_max: usize,
    /// forward → transpose
    forward_plan: CommPlan,
    /// transpose → forward
    backward_plan: CommPlan,
}

impl<S: ProductSector> BasisPartition<S> {
    /// Collective; see [`with_config`](Self::with_config).
    pub fn new<G: ProcessGroup>(sector: S, group: &G) -> Result<Self, BasisError> {
        Self::with_config(sector, group, PartitionConfig::default())
    }

    /// Collective. Fails before the first collective on an invalid group, so
    /// every rank reaches the same error.
    pub fn with_config<G: ProcessGroup>(
        sector: S,
        group: &G,
        config: PartitionConfig,
    ) -> Result<Self, BasisError> {
        check_group(group)?;
        let (rank, n_ranks) = (group.rank(), group.size());
        let ownership = Ownership::new(n_ranks);
        let base = CommTag::new(config.tag_base);

        let forward = LocalOrdering::build(&sector, Sublattice::Up, &ownership, rank);
        let transpose = LocalOrdering::build(&sector, Sublattice::Dn, &ownership, rank);
        log::debug!(
            "[rank {rank}/{n_ranks}] forward size {}, transpose size {}",
            forward.len(),
            transpose.len()
        );

        let sizes_fwd = group.all_gather(forward.len() as u64, base.offset(TAG_SIZES_FWD))?;
        let sizes_tr = group.all_gather(transpose.len() as u64, base.offset(TAG_SIZES_TR))?;
        let dim_fwd: u64 = sizes_fwd.iter().sum();
        let dim_tr: u64 = sizes_tr.iter().sum();
        debug_assert_eq!(dim_fwd, dim_tr, "orderings disagree on the global dimension");
        debug_assert_eq!(dim_fwd as usize, sector.dim(), "global dimension differs from closed form");
        let (size_min, size_max) = match sizes_fwd.iter().chain(&sizes_tr).minmax() {
            MinMaxResult::NoElements => (0, 0),
            MinMaxResult::OneElement(&x) => (x as usize, x as usize),
            MinMaxResult::MinMax(&lo, &hi) => (lo as usize, hi as usize),
        };

        let forward_plan = CommPlan::build(
            group,
            |emit: &mut dyn FnMut(usize, S::Bits, S::Bits)| {
                forward.for_each(&sector, |_, up, dn| emit(ownership.rank_of(dn), dn, up))
            },
            |dn, up| transpose.index_of(&sector, dn, up),
            transpose.len(),
            base.offset(TAG_PLAN_FWD),
        )?;
        let backward_plan = CommPlan::build(
            group,
            |emit: &mut dyn FnMut(usize, S::Bits, S::Bits)| {
                transpose.for_each(&sector, |_, dn, up| emit(ownership.rank_of(up), up, dn))
            },
            |up, dn| forward.index_of(&sector, up, dn),
            forward.len(),
            base.offset(TAG_PLAN_BWD),
        )?;

        let part = Self {
            sector,
            ownership,
            config,
            rank,
            n_ranks,
            forward,
            transpose,
            dim: dim_fwd as usize,
            size_min,
            size_max,
            forward_plan,
            backward_plan,
        };
        part.report_balance();
        if part.config.check_invariants {
            part.validate_invariants()?;
        } else {
            part.debug_assert_invariants();
        }
        Ok(part)
    }

    fn report_balance(&self) {
        let ratio = self.imbalance();
        if self.rank == 0 && self.config.log_load_balance {
            log::info!(
                "basis: dim {} on {} ranks, local sizes {}..={} (imbalance {ratio:.3})",
                self.dim,
                self.n_ranks,
                self.size_min,
                self.size_max
            );
        }
        if self.rank == 0 && ratio > self.config.imbalance_warn_ratio {
            log::warn!(
                "basis: load imbalance {ratio:.3} exceeds {}",
                self.config.imbalance_warn_ratio
            );
        }
    }

    pub fn sector(&self) -> &S {
        &self.sector
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn n_ranks(&self) -> usize {
        self.n_ranks
    }

    /// Global dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Local length of a vector in the forward ordering.
    pub fn local_dim(&self) -> usize {
        self.forward.len()
    }

    /// Local length of a vector in the transpose ordering.
    pub fn transpose_dim(&self) -> usize {
        self.transpose.len()
    }

    /// Smallest local size over all ranks and both orderings.
    pub fn size_min(&self) -> usize {
        self.size_min
    }

    pub fn size_max(&self) -> usize {
        self.size_max
    }

    /// `size_max / size_min`; infinite when some rank holds nothing.
    pub fn imbalance(&self) -> f64 {
        if self.size_min == 0 {
            if self.size_max == 0 { 1.0 } else { f64::INFINITY }
        } else {
            self.size_max as f64 / self.size_min as f64
        }
    }

    pub fn forward(&self) -> &LocalOrdering<S::Bits> {
        &self.forward
    }

    pub fn transpose_ordering(&self) -> &LocalOrdering<S::Bits> {
        &self.transpose
    }

    pub fn forward_plan(&self) -> &CommPlan {
        &self.forward_plan
    }

    pub fn backward_plan(&self) -> &CommPlan {
        &self.backward_plan
    }

    /// Local forward index of `(up, dn)`, or `None` if the pair is not in
    /// the sector or stored elsewhere.
    pub fn index(&self, up: S::Bits, dn: S::Bits) -> Option<usize> {
        if !self.sector.contains(up, dn) || self.ownership.rank_of(up) != self.rank {
            return None;
        }
        self.forward.index_of(&self.sector, up, dn)
    }

    /// Local transpose index of `(up, dn)`.
    pub fn transpose_index(&self, up: S::Bits, dn: S::Bits) -> Option<usize> {
        if !self.sector.contains(up, dn) || self.ownership.rank_of(dn) != self.rank {
            return None;
        }
        self.transpose.index_of(&self.sector, dn, up)
    }

    /// `(index, up, dn)` for every local pair of the forward ordering.
    pub fn iter(&self) -> impl Iterator<Item = (usize, S::Bits, S::Bits)> + '_ {
        self.forward.iter(&self.sector)
    }

    /// `(index, up, dn)` for every local pair of the transpose ordering.
    pub fn iter_transpose(&self) -> impl Iterator<Item = (usize, S::Bits, S::Bits)> + '_ {
        self.transpose
            .iter(&self.sector)
            .map(|(i, dn, up)| (i, up, dn))
    }

    /// Scratch for [`transpose`](Self::transpose) and
    /// [`transpose_back`](Self::transpose_back).
    pub fn buffers<T: Coeff>(&self) -> Result<TransposeBuffers<T>, BasisError> {
        TransposeBuffers::for_plans(&[&self.forward_plan, &self.backward_plan], self.rank)
    }

    pub(crate) fn check_same_group<G: ProcessGroup>(&self, group: &G) -> Result<(), BasisError> {
        if group.rank() != self.rank || group.size() != self.n_ranks {
            return Err(BasisError::GroupMismatch {
                expected_rank: self.rank,
                expected_size: self.n_ranks,
                found_rank: group.rank(),
                found_size: group.size(),
            });
        }
        Ok(())
    }

    /// Collective. Forward-ordered `input` into transpose-ordered `output`.
    pub fn transpose<G: ProcessGroup, T: Coeff>(
        &self,
        group: &G,
        input: &[T],
        output: &mut [T],
        bufs: &mut TransposeBuffers<T>,
    ) -> Result<(), BasisError> {
        self.check_same_group(group)?;
        log::trace!("[rank {}] transpose {} -> {}", self.rank, input.len(), output.len());
        let tag = CommTag::new(self.config.tag_base).offset(TAG_TRANSPOSE);
        transpose::run(&self.forward_plan, group, input, output, bufs, tag)
    }

    /// Collective. Transpose-ordered `input` back into forward order.
    pub fn transpose_back<G: ProcessGroup, T: Coeff>(
        &self,
        group: &G,
        input: &[T],
        output: &mut [T],
        bufs: &mut TransposeBuffers<T>,
    ) -> Result<(), BasisError> {
        self.check_same_group(group)?;
        log::trace!("[rank {}] transpose back {} -> {}", self.rank, input.len(), output.len());
        let tag = CommTag::new(self.config.tag_base).offset(TAG_TRANSPOSE_BACK);
        transpose::run(&self.backward_plan, group, input, output, bufs, tag)
    }

    /// Allocating [`transpose`](Self::transpose).
    pub fn transposed<G: ProcessGroup, T: Coeff>(
        &self,
        group: &G,
        input: &[T],
    ) -> Result<Vec<T>, BasisError> {
        let mut bufs = self.buffers()?;
        let mut out = try_filled(self.transpose.len(), T::zero(), self.rank, "transposed vector")?;
        self.transpose(group, input, &mut out, &mut bufs)?;
        Ok(out)
    }
}

impl<S: ProductSector> DebugInvariants for BasisPartition<S> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "BasisPartition");
    }

    fn validate_invariants(&self) -> Result<(), BasisError> {
        self.forward.validate_invariants()?;
        self.transpose.validate_invariants()?;
        for (plan, from, to) in [
            (&self.forward_plan, self.forward.len(), self.transpose.len()),
            (&self.backward_plan, self.transpose.len(), self.forward.len()),
        ] {
            plan.validate_invariants()?;
            plan.check_bijection()?;
            if plan.n_send() != from {
                return Err(BasisError::LengthMismatch {
                    what: "plan send total",
                    expected: from,
                    found: plan.n_send(),
                });
            }
            if plan.n_recv() != to {
                return Err(BasisError::LengthMismatch {
                    what: "plan recv total",
                    expected: to,
                    found: plan.n_recv(),
                });
            }
        }
        Ok(())
    }
}

static_assertions::assert_impl_all!(
    BasisPartition<crate::sector::Sector<u64>>: Send, Sync, Clone
);
