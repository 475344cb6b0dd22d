//! Distributed matrix-free `out = H · in`.
//!
//! Terms are sorted by [`TermKind`] once, at construction:
//!
//! * diagonal terms and `Flip(Dn)` terms run on the forward layout without
//!   communication;
//! * `Mixed` terms get their own [`CommPlan`] plus the cached source index
//!   and matrix element of every contribution, so an apply only ships
//!   `element · in[src]`;
//! * `Flip(Up)` terms run on the transpose layout, which costs one transpose
//!   there and one back.
//!
//! Input and output may live on different partitions of the same group, for
//! terms such as [`Raise`](super::Raise) and [`Lower`](super::Lower) that
//! change the particle number. Input is read in the input partition's
//! layouts and results are written in the output partition's; the round trip
//! goes out through the input's forward plan and back through the output's
//! backward plan.

use crate::algs::collective::ProcessGroup;
use crate::algs::communicator::CommTag;
use crate::basis::{BasisPartition, CommPlan, TransposeBuffers, try_filled};
use crate::basis_error::BasisError;
use crate::operator::{Coeff, Term, TermKind};
use crate::sector::{ProductSector, Sublattice};

const TAG_MIXED_PLAN: u16 = 8;
const TAG_MIXED_PAYLOAD: u16 = 10;

/// Counters since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub applies: usize,
    pub transposes: usize,
    pub payload_exchanges: usize,
}

#[derive(Debug)]
struct MixedRoute<T> {
    plan: CommPlan,
    send_src: Vec<usize>,
    send_coeff: Vec<T>,
    send_buf: Vec<T>,
    recv_buf: Vec<T>,
}

/// Working vectors of the transpose round trip.
#[derive(Debug)]
struct CrossScratch<T> {
    bufs: TransposeBuffers<T>,
    /// transpose-ordered input and output
    t_in: Vec<T>,
    t_out: Vec<T>,
    /// forward-ordered result
    back: Vec<T>,
}

impl<T> Default for CrossScratch<T> {
    fn default() -> Self {
        Self {
            bufs: TransposeBuffers::default(),
            t_in: Vec::new(),
            t_out: Vec::new(),
            back: Vec::new(),
        }
    }
}

pub struct DistributedOperator<'a, S: ProductSector, T: Coeff> {
    partition: &'a BasisPartition<S>,
    partition_out: &'a BasisPartition<S>,
    terms: Vec<Box<dyn Term<S::Bits, T>>>,
    diagonal: Vec<usize>,
    same_sector: Vec<usize>,
    cross_sector: Vec<usize>,
    mixed: Vec<MixedRoute<T>>,
    scratch: CrossScratch<T>,
    stats: ApplyStats,
}

impl<'a, S: ProductSector, T: Coeff> DistributedOperator<'a, S, T> {
    /// Collective when `terms` contains mixed terms. Terms are validated
    /// before any communication.
    pub fn new<G: ProcessGroup>(
        partition: &'a BasisPartition<S>,
        terms: Vec<Box<dyn Term<S::Bits, T>>>,
        group: &G,
    ) -> Result<Self, BasisError> {
        Self::between(partition, partition, terms, group)
    }

    /// Operator from vectors on `partition` to vectors on `partition_out`.
    /// Both must be built on `group` over the same lattice. Contributions
    /// that leave the output sector are dropped.
    pub fn between<G: ProcessGroup>(
        partition: &'a BasisPartition<S>,
        partition_out: &'a BasisPartition<S>,
        terms: Vec<Box<dyn Term<S::Bits, T>>>,
        group: &G,
    ) -> Result<Self, BasisError> {
        partition.check_same_group(group)?;
        partition_out.check_same_group(group)?;
        let n_sites = partition.sector().n_sites();
        if partition_out.sector().n_sites() != n_sites {
            return Err(BasisError::invalid_sector(format!(
                "operator maps {n_sites} sites onto {}",
                partition_out.sector().n_sites()
            )));
        }
        for term in &terms {
            term.validate(n_sites)?;
        }

        let mut diagonal = Vec::new();
        let mut same_sector = Vec::new();
        let mut cross_sector = Vec::new();
        let mut mixed_terms = Vec::new();
        for (k, term) in terms.iter().enumerate() {
            match term.kind() {
                TermKind::Diagonal => diagonal.push(k),
                TermKind::Flip(Sublattice::Dn) => same_sector.push(k),
                TermKind::Flip(Sublattice::Up) => cross_sector.push(k),
                TermKind::Mixed => mixed_terms.push(k),
            }
        }

        let rank = partition.rank();
        let base = CommTag::new(partition.config().tag_base);
        let mut mixed = Vec::with_capacity(mixed_terms.len());
        for &k in &mixed_terms {
            mixed.push(Self::route(partition, partition_out, terms[k].as_ref(), group, base)?);
        }

        let scratch = if cross_sector.is_empty() {
            CrossScratch::default()
        } else {
            CrossScratch {
                bufs: TransposeBuffers::for_plans(
                    &[partition.forward_plan(), partition_out.backward_plan()],
                    rank,
                )?,
                t_in: try_filled(partition.transpose_dim(), T::zero(), rank, "apply scratch")?,
                t_out: try_filled(partition_out.transpose_dim(), T::zero(), rank, "apply scratch")?,
                back: try_filled(partition_out.local_dim(), T::zero(), rank, "apply scratch")?,
            }
        };
        let op = Self {
            partition,
            partition_out,
            scratch,
            terms,
            diagonal,
            same_sector,
            cross_sector,
            mixed,
            stats: ApplyStats::default(),
        };
        log::debug!(
            "[rank {rank}] operator: {} diagonal, {} same-sector, {} cross-sector, {} mixed terms",
            op.diagonal.len(),
            op.same_sector.len(),
            op.cross_sector.len(),
            op.mixed.len()
        );
        Ok(op)
    }

    /// Plan the contributions of one mixed term.
    fn route<G: ProcessGroup>(
        partition: &BasisPartition<S>,
        partition_out: &BasisPartition<S>,
        term: &dyn Term<S::Bits, T>,
        group: &G,
        base: CommTag,
    ) -> Result<MixedRoute<T>, BasisError> {
        let sector_out = partition_out.sector();
        let ownership = partition_out.ownership();
        let rank = partition.rank();

        let mut contribs = Vec::new();
        let mut out = Vec::new();
        partition.forward().for_each(partition.sector(), |i, up, dn| {
            out.clear();
            term.act(up, dn, &mut out);
            for &(up2, dn2, c) in &out {
                if sector_out.contains(up2, dn2) {
                    contribs.push((i, up2, dn2, c));
                }
            }
        });

        let plan = CommPlan::build(
            group,
            |emit: &mut dyn FnMut(usize, S::Bits, S::Bits)| {
                for &(_, up2, dn2, _) in &contribs {
                    emit(ownership.rank_of(up2), up2, dn2);
                }
            },
            |up, dn| partition_out.index(up, dn),
            partition_out.local_dim(),
            base.offset(TAG_MIXED_PLAN),
        )?;
        let send_src = contribs.iter().map(|c| c.0).collect();
        let send_coeff = contribs.iter().map(|c| c.3).collect();
        Ok(MixedRoute {
            send_buf: try_filled(plan.n_send(), T::zero(), rank, "mixed send buffer")?,
            recv_buf: try_filled(plan.n_recv(), T::zero(), rank, "mixed recv buffer")?,
            plan,
            send_src,
            send_coeff,
        })
    }

    /// Partition of the input vectors.
    pub fn partition(&self) -> &BasisPartition<S> {
        self.partition
    }

    /// Partition of the output vectors; the input partition unless built
    /// with [`between`](Self::between).
    pub fn partition_out(&self) -> &BasisPartition<S> {
        self.partition_out
    }

    pub fn apply_stats(&self) -> ApplyStats {
        self.stats
    }

    /// Whether an apply issues any collective.
    pub fn communicates(&self) -> bool {
        !self.mixed.is_empty() || !self.cross_sector.is_empty()
    }

    /// Collective unless [`communicates`](Self::communicates) is false.
    /// Both vectors are in the forward ordering of their partition.
    pub fn apply<G: ProcessGroup>(
        &mut self,
        group: &G,
        input: &[T],
        output: &mut [T],
    ) -> Result<(), BasisError> {
        let part = self.partition;
        part.check_same_group(group)?;
        let n = part.local_dim();
        for (what, expected, len) in [
            ("apply input", n, input.len()),
            ("apply output", self.partition_out.local_dim(), output.len()),
        ] {
            if len != expected {
                return Err(BasisError::LengthMismatch {
                    what,
                    expected,
                    found: len,
                });
            }
        }
        log::trace!("[rank {}] apply on {n} local coefficients", part.rank());
        self.stats.applies += 1;
        output.iter_mut().for_each(|x| *x = T::zero());

        self.apply_diagonal(input, output);
        self.apply_local(Sublattice::Up, input, output);

        let tag = CommTag::new(part.config().tag_base).offset(TAG_MIXED_PAYLOAD);
        for route in &mut self.mixed {
            let MixedRoute {
                plan,
                send_src,
                send_coeff,
                send_buf,
                recv_buf,
            } = route;
            for ((&slot, &src), &c) in plan.send_slot().iter().zip(send_src.iter()).zip(send_coeff.iter()) {
                send_buf[slot] = c * input[src];
            }
            plan.exchange(group, send_buf, recv_buf, tag)?;
            plan.scatter_add(recv_buf, output);
            self.stats.payload_exchanges += 1;
        }

        if !self.cross_sector.is_empty() {
            let mut scratch = std::mem::take(&mut self.scratch);
            let result = self.apply_cross(group, input, output, &mut scratch);
            self.scratch = scratch;
            self.stats.transposes += 2;
            self.stats.payload_exchanges += 2;
            result?;
        }
        Ok(())
    }

    /// `Flip(Up)` terms: transpose, apply block-locally, transpose back.
    fn apply_cross<G: ProcessGroup>(
        &self,
        group: &G,
        input: &[T],
        output: &mut [T],
        scratch: &mut CrossScratch<T>,
    ) -> Result<(), BasisError> {
        let CrossScratch {
            bufs,
            t_in,
            t_out,
            back,
        } = scratch;
        self.partition.transpose(group, input, t_in, bufs)?;
        t_out.iter_mut().for_each(|x| *x = T::zero());
        self.apply_local(Sublattice::Dn, t_in, t_out);
        self.partition_out.transpose_back(group, t_out, back, bufs)?;
        for (o, &b) in output.iter_mut().zip(back.iter()) {
            *o += b;
        }
        Ok(())
    }

    fn apply_diagonal(&self, input: &[T], output: &mut [T]) {
        if self.diagonal.is_empty() {
            return;
        }
        let (part, out) = (self.partition, self.partition_out);
        let same = std::ptr::eq(part, out);
        part.forward().for_each(part.sector(), |i, up, dn| {
            let dst = if same { Some(i) } else { out.index(up, dn) };
            let Some(dst) = dst else {
                return;
            };
            let mut d = T::zero();
            for &k in &self.diagonal {
                d += self.terms[k].diagonal(up, dn);
            }
            output[dst] += d * input[i];
        });
    }

    /// Flip terms that stay inside the blocks of the ordering headed by
    /// `major`: `Flip(Dn)` terms on the forward ordering (`major == Up`),
    /// `Flip(Up)` terms on the transpose ordering. Heads keep their owner, so
    /// the output block sits on this rank too.
    fn apply_local(&self, major: Sublattice, input: &[T], output: &mut [T]) {
        let (part, out) = (self.partition, self.partition_out);
        let (ids, src, dst) = match major {
            Sublattice::Up => (&self.same_sector, part.forward(), out.forward()),
            Sublattice::Dn => (
                &self.cross_sector,
                part.transpose_ordering(),
                out.transpose_ordering(),
            ),
        };
        if ids.is_empty() {
            return;
        }
        let sector_out = out.sector();
        src.for_each_block(part.sector(), |start, head, partners| {
            let Some(block) = dst.block(head) else {
                return;
            };
            for (j, &p) in partners.iter().enumerate() {
                let x = input[start + j];
                for &k in ids {
                    let Some((p2, c)) = self.terms[k].flip(head, p) else {
                        continue;
                    };
                    let valid = match major {
                        Sublattice::Up => sector_out.contains(head, p2),
                        Sublattice::Dn => sector_out.contains(p2, head),
                    };
                    if valid {
                        output[block.start + sector_out.partner_index(major, head, p2)] += c * x;
                    }
                }
            }
        });
    }
}
