//! Collectives used by partitions, plans and operators.
//!
//! [`ProcessGroup`] is the explicit context every constructor and apply call
//! receives. The point-to-point backends implement it by posting all receives,
//! then all sends, waiting on every receive without returning early and
//! always draining the send handles before the first error is reported.

use crate::algs::communicator::{CommTag, Communicator, NoComm, ThreadComm, Wait};
use crate::algs::wire::{WireCount, cast_slice, cast_slice_mut, expect_exact_len};
use crate::basis_error::BasisError;
use crate::operator::Coeff;
use bytemuck::Pod;
use std::ops::Range;

/// Per-peer counts and exclusive-prefix offsets into a flat buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockLayout {
    counts: Vec<usize>,
    offsets: Vec<usize>,
}

impl BlockLayout {
    pub fn from_counts(counts: Vec<usize>) -> Self {
        let offsets = counts
            .iter()
            .scan(0usize, |acc, &c| {
                let start = *acc;
                *acc += c;
                Some(start)
            })
            .collect();
        Self { counts, offsets }
    }

    /// `per_peer` elements for each of `n_peers`.
    pub fn uniform(n_peers: usize, per_peer: usize) -> Self {
        Self::from_counts(vec![per_peer; n_peers])
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn n_peers(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, peer: usize) -> usize {
        self.counts[peer]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn range(&self, peer: usize) -> Range<usize> {
        self.offsets[peer]..self.offsets[peer] + self.counts[peer]
    }

    /// Same layout in units `k` times smaller (elements → bytes).
    pub fn scaled(&self, k: usize) -> Self {
        Self {
            counts: self.counts.iter().map(|c| c * k).collect(),
            offsets: self.offsets.iter().map(|o| o * k).collect(),
        }
    }

    /// Whether the offsets are the exclusive prefix sums of the counts.
    pub fn is_prefix(&self) -> bool {
        self.counts.len() == self.offsets.len()
            && self
                .counts
                .iter()
                .zip(&self.offsets)
                .try_fold(0usize, |acc, (&c, &o)| (acc == o).then_some(acc + c))
                .is_some()
    }
}

/// Explicit process-group context.
///
/// All members must issue the same collectives in the same order with the
/// same tags.
pub trait ProcessGroup {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Variable-size all-to-all over raw bytes. Layouts are in bytes;
    /// block `p` of `send` goes to rank `p`, block `p` of `recv` comes from
    /// rank `p`.
    fn all_to_all_bytes(
        &self,
        send: &[u8],
        send_layout: &BlockLayout,
        recv: &mut [u8],
        recv_layout: &BlockLayout,
        tag: CommTag,
    ) -> Result<(), BasisError>;

    /// One value from every rank, indexed by rank.
    fn all_gather(&self, value: u64, tag: CommTag) -> Result<Vec<u64>, BasisError>;

    /// Release every member from pending collectives. `MpiComm` terminates
    /// the job.
    fn abort(&self, code: i32);

    /// Typed variable-size all-to-all; layouts count elements.
    fn all_to_all_v<T: Pod>(
        &self,
        send: &[T],
        send_layout: &BlockLayout,
        recv: &mut [T],
        recv_layout: &BlockLayout,
        tag: CommTag,
    ) -> Result<(), BasisError>
    where
        Self: Sized,
    {
        let k = std::mem::size_of::<T>();
        self.all_to_all_bytes(
            cast_slice(send),
            &send_layout.scaled(k),
            cast_slice_mut(recv),
            &recv_layout.scaled(k),
            tag,
        )
    }

    /// Fixed-size all-to-all: `send[p]` goes to rank `p`, the result holds
    /// what every rank sent to this one.
    fn all_to_all(&self, send: &[usize], tag: CommTag) -> Result<Vec<usize>, BasisError>
    where
        Self: Sized,
    {
        let size = self.size();
        if send.len() != size {
            return Err(BasisError::LengthMismatch {
                what: "all_to_all send counts",
                expected: size,
                found: send.len(),
            });
        }
        let out: Vec<WireCount> = send.iter().map(|&n| WireCount::new(n)).collect();
        let mut inc = vec![WireCount::default(); size];
        let unit = BlockLayout::uniform(size, 1);
        self.all_to_all_v(&out, &unit, &mut inc, &unit, tag)?;
        Ok(inc.iter().map(WireCount::get).collect())
    }
}

/// Reject rank/size pairs that cannot describe a group.
pub fn check_group<G: ProcessGroup>(group: &G) -> Result<(), BasisError> {
    let (rank, size) = (group.rank(), group.size());
    if size == 0 || rank >= size {
        return Err(BasisError::InvalidGroup { rank, size });
    }
    Ok(())
}

pub(crate) fn check_layouts(
    size: usize,
    send_len: usize,
    send_layout: &BlockLayout,
    recv_len: usize,
    recv_layout: &BlockLayout,
) -> Result<(), BasisError> {
    for (what, layout, len) in [
        ("send layout", send_layout, send_len),
        ("recv layout", recv_layout, recv_len),
    ] {
        if layout.n_peers() != size {
            return Err(BasisError::LengthMismatch {
                what,
                expected: size,
                found: layout.n_peers(),
            });
        }
        if layout.total() > len {
            return Err(BasisError::LengthMismatch {
                what,
                expected: layout.total(),
                found: len,
            });
        }
    }
    Ok(())
}

fn lost_peer<C: Communicator>(comm: &C, peer: usize, what: &str) -> BasisError {
    match comm.aborted() {
        Some(code) => BasisError::Aborted(code),
        None => BasisError::CommError {
            neighbor: peer,
            message: format!("failed to receive {what} from rank {peer}"),
        },
    }
}

/// [`ProcessGroup::all_to_all_bytes`] over point-to-point messages.
pub fn p2p_all_to_all_bytes<C: Communicator>(
    comm: &C,
    send: &[u8],
    send_layout: &BlockLayout,
    recv: &mut [u8],
    recv_layout: &BlockLayout,
    tag: CommTag,
) -> Result<(), BasisError> {
    let (me, size) = (comm.rank(), comm.size());
    check_layouts(size, send.len(), send_layout, recv.len(), recv_layout)?;
    if send_layout.count(me) != recv_layout.count(me) {
        return Err(BasisError::CommError {
            neighbor: me,
            message: expect_exact_len(send_layout.count(me), recv_layout.count(me))
                .err()
                .unwrap_or_default(),
        });
    }
    recv[recv_layout.range(me)].copy_from_slice(&send[send_layout.range(me)]);

    // 1) post all receives
    let mut pending_recvs = Vec::with_capacity(size.saturating_sub(1));
    for peer in (0..size).filter(|&p| p != me) {
        let h = comm.irecv(peer, tag.as_u16(), &mut recv[recv_layout.range(peer)]);
        pending_recvs.push((peer, h));
    }

    // 2) post all sends, empty blocks included so every receive matches
    let mut pending_sends = Vec::with_capacity(size.saturating_sub(1));
    for peer in (0..size).filter(|&p| p != me) {
        pending_sends.push(comm.isend(peer, tag.as_u16(), &send[send_layout.range(peer)]));
    }

    // 3) wait for all recvs (but do not early-return)
    let mut maybe_err = None;
    for (peer, h) in pending_recvs {
        match h.wait() {
            Some(data) if data.len() == recv_layout.count(peer) => {
                if maybe_err.is_none() {
                    recv[recv_layout.range(peer)].copy_from_slice(&data);
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(BasisError::CommError {
                    neighbor: peer,
                    message: expect_exact_len(data.len(), recv_layout.count(peer))
                        .err()
                        .unwrap_or_default(),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(lost_peer(comm, peer, "payload"));
            }
            _ => {}
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// [`ProcessGroup::all_gather`] over point-to-point messages.
pub fn p2p_all_gather<C: Communicator>(
    comm: &C,
    value: u64,
    tag: CommTag,
) -> Result<Vec<u64>, BasisError> {
    let (me, size) = (comm.rank(), comm.size());
    let bytes = value.to_le_bytes();
    let mut out = vec![0u64; size];
    out[me] = value;

    let mut pending_recvs = Vec::with_capacity(size.saturating_sub(1));
    for peer in (0..size).filter(|&p| p != me) {
        let mut buf = [0u8; 8];
        pending_recvs.push((peer, comm.irecv(peer, tag.as_u16(), &mut buf)));
    }
    let pending_sends: Vec<_> = (0..size)
        .filter(|&p| p != me)
        .map(|peer| comm.isend(peer, tag.as_u16(), &bytes))
        .collect();

    let mut maybe_err = None;
    for (peer, h) in pending_recvs {
        match h.wait() {
            Some(data) => match <[u8; 8]>::try_from(data.as_slice()) {
                Ok(raw) => out[peer] = u64::from_le_bytes(raw),
                Err(_) if maybe_err.is_none() => {
                    maybe_err = Some(BasisError::CommError {
                        neighbor: peer,
                        message: expect_exact_len(data.len(), 8).err().unwrap_or_default(),
                    });
                }
                Err(_) => {}
            },
            None if maybe_err.is_none() => {
                maybe_err = Some(lost_peer(comm, peer, "gather value"));
            }
            None => {}
        }
    }
    for send in pending_sends {
        let _ = send.wait();
    }
    match maybe_err {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

impl ProcessGroup for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_to_all_bytes(
        &self,
        send: &[u8],
        send_layout: &BlockLayout,
        recv: &mut [u8],
        recv_layout: &BlockLayout,
        tag: CommTag,
    ) -> Result<(), BasisError> {
        p2p_all_to_all_bytes(self, send, send_layout, recv, recv_layout, tag)
    }

    fn all_gather(&self, value: u64, _tag: CommTag) -> Result<Vec<u64>, BasisError> {
        Ok(vec![value])
    }

    fn abort(&self, _code: i32) {}
}

impl ProcessGroup for ThreadComm {
    fn rank(&self) -> usize {
        ThreadComm::rank(self)
    }

    fn size(&self) -> usize {
        ThreadComm::size(self)
    }

    fn all_to_all_bytes(
        &self,
        send: &[u8],
        send_layout: &BlockLayout,
        recv: &mut [u8],
        recv_layout: &BlockLayout,
        tag: CommTag,
    ) -> Result<(), BasisError> {
        p2p_all_to_all_bytes(self, send, send_layout, recv, recv_layout, tag)
    }

    fn all_gather(&self, value: u64, tag: CommTag) -> Result<Vec<u64>, BasisError> {
        p2p_all_gather(self, value, tag)
    }

    fn abort(&self, code: i32) {
        ThreadComm::abort(self, code)
    }
}

// --- reductions, folded in rank order so every rank gets identical bits ---

pub fn all_reduce_sum<G: ProcessGroup>(g: &G, v: usize, tag: CommTag) -> Result<usize, BasisError> {
    Ok(g.all_gather(v as u64, tag)?.iter().map(|&x| x as usize).sum())
}

pub fn all_reduce_min<G: ProcessGroup>(g: &G, v: usize, tag: CommTag) -> Result<usize, BasisError> {
    Ok(g.all_gather(v as u64, tag)?
        .iter()
        .map(|&x| x as usize)
        .min()
        .unwrap_or(v))
}

pub fn all_reduce_max<G: ProcessGroup>(g: &G, v: usize, tag: CommTag) -> Result<usize, BasisError> {
    Ok(g.all_gather(v as u64, tag)?
        .iter()
        .map(|&x| x as usize)
        .max()
        .unwrap_or(v))
}

pub fn all_reduce_sum_f64<G: ProcessGroup>(g: &G, v: f64, tag: CommTag) -> Result<f64, BasisError> {
    Ok(g.all_gather(v.to_bits(), tag)?
        .iter()
        .map(|&b| f64::from_bits(b))
        .sum())
}

/// Distributed `⟨a|b⟩` (conjugating `a`). Uses tags `tag` and `tag + 1`.
pub fn dot<G: ProcessGroup, T: Coeff>(
    g: &G,
    a: &[T],
    b: &[T],
    tag: CommTag,
) -> Result<T, BasisError> {
    if a.len() != b.len() {
        return Err(BasisError::LengthMismatch {
            what: "dot operands",
            expected: a.len(),
            found: b.len(),
        });
    }
    let local = a
        .iter()
        .zip(b)
        .fold(T::zero(), |acc, (&x, &y)| acc + x.conj() * y);
    let (re, im) = local.to_parts();
    let re = all_reduce_sum_f64(g, re, tag)?;
    let im = all_reduce_sum_f64(g, im, tag.offset(1))?;
    Ok(T::from_parts(re, im))
}

/// Distributed 2-norm.
pub fn norm<G: ProcessGroup, T: Coeff>(g: &G, a: &[T], tag: CommTag) -> Result<f64, BasisError> {
    let local: f64 = a.iter().map(|x| x.abs() * x.abs()).sum();
    Ok(all_reduce_sum_f64(g, local, tag)?.sqrt())
}
