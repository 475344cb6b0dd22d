//! Cached routing between two layouts of distributed data.
//!
//! A plan is built once from a list of entries, each naming the destination
//! rank and the `(head, partner)` pair it must land on. Afterwards every
//! exchange only moves payload: pack by `send_slot`, one variable-size
//! all-to-all, scatter by `permutation`.

use super::try_filled;
use crate::algs::collective::{BlockLayout, ProcessGroup};
use crate::algs::communicator::CommTag;
use crate::algs::wire::WirePair;
use crate::basis_error::BasisError;
use crate::bits::BitPattern;
use crate::debug_invariants::DebugInvariants;
use bytemuck::Pod;
use std::ops::AddAssign;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommPlan {
    send: BlockLayout,
    recv: BlockLayout,
    /// Position of entry `i` in the send buffer.
    send_slot: Vec<usize>,
    /// Destination index of receive slot `j`.
    permutation: Vec<usize>,
    /// Length of the destination vector.
    target_len: usize,
}

impl CommPlan {
    /// Collective. `entries` is called twice and must report the same
    /// `(dest_rank, head, partner)` sequence both times; `resolve` maps a
    /// received pair to its index in the destination vector of length
    /// `target_len`. Uses tags `tag` and `tag + 1`.
    ///
    /// An entry addressed outside the group, or an inbound pair `resolve`
    /// rejects, is a caller bug. Both collectives still complete on every
    /// rank; the violation then panics in debug builds (or with
    /// `check-invariants`) and is returned as an error otherwise. Only the
    /// offending rank sees that error, so the caller must
    /// [`abort`](ProcessGroup::abort) the group rather than continue.
    pub fn build<B, G, E, R>(
        group: &G,
        entries: E,
        resolve: R,
        target_len: usize,
        tag: CommTag,
    ) -> Result<Self, BasisError>
    where
        B: BitPattern,
        G: ProcessGroup,
        E: Fn(&mut dyn FnMut(usize, B, B)),
        R: Fn(B, B) -> Option<usize>,
    {
        let rank = group.rank();
        let size = group.size();

        // 1) count phase
        let mut counts = vec![0usize; size];
        let mut bad_dest = None;
        entries(&mut |dest: usize, _: B, _: B| match counts.get_mut(dest) {
            Some(c) => *c += 1,
            None => bad_dest = Some(dest),
        });

        // 2) count exchange
        let recv_counts = group.all_to_all(&counts, tag)?;
        let send = BlockLayout::from_counts(counts);
        let recv = BlockLayout::from_counts(recv_counts);

        // 3) pack the target pairs by destination
        let n_send = send.total();
        let mut pairs = try_filled(n_send, WirePair::default(), rank, "plan send pairs")?;
        let mut send_slot = try_filled(n_send, 0usize, rank, "plan send slots")?;
        let mut cursor = send.offsets().to_vec();
        let mut i = 0usize;
        entries(&mut |dest: usize, head: B, partner: B| {
            if dest >= size {
                return;
            }
            let slot = cursor[dest];
            cursor[dest] += 1;
            pairs[slot] = WirePair::new(head, partner);
            send_slot[i] = slot;
            i += 1;
        });

        // 4) content exchange, then resolve every inbound pair
        let mut inbound = try_filled(recv.total(), WirePair::default(), rank, "plan recv pairs")?;
        group.all_to_all_v(&pairs, &send, &mut inbound, &recv, tag.offset(1))?;
        let mut unresolved = None;
        let permutation: Vec<usize> = inbound
            .iter()
            .map(|w| {
                let (head, partner) = (w.head::<B>(), w.partner::<B>());
                resolve(head, partner).unwrap_or_else(|| {
                    unresolved.get_or_insert(BasisError::NotOwned {
                        rank,
                        head: head.to_u64(),
                        partner: partner.to_u64(),
                    });
                    usize::MAX
                })
            })
            .collect();

        // caller bugs, reported only after the peers are released
        let violation = match (bad_dest, unresolved) {
            (Some(dest), _) => Some(BasisError::InvalidGroup { rank: dest, size }),
            (None, err) => err,
        };
        if let Some(err) = violation {
            crate::debug_invariants!(Err::<(), _>(err.clone()), "CommPlan entries");
            return Err(err);
        }

        log::debug!(
            "[rank {rank}] plan: {} entries out, {} in",
            n_send,
            permutation.len()
        );
        Ok(Self {
            send,
            recv,
            send_slot,
            permutation,
            target_len,
        })
    }

    pub fn send_layout(&self) -> &BlockLayout {
        &self.send
    }

    pub fn recv_layout(&self) -> &BlockLayout {
        &self.recv
    }

    pub fn send_slot(&self) -> &[usize] {
        &self.send_slot
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    pub fn n_send(&self) -> usize {
        self.send_slot.len()
    }

    pub fn n_recv(&self) -> usize {
        self.permutation.len()
    }

    pub fn target_len(&self) -> usize {
        self.target_len
    }

    /// Place entry values into send order: `buf[send_slot[i]] = values[i]`.
    pub fn pack<T: Copy>(&self, values: &[T], buf: &mut [T]) {
        for (&slot, &v) in self.send_slot.iter().zip(values) {
            buf[slot] = v;
        }
    }

    /// `dst[permutation[j]] = recv[j]`.
    pub fn scatter<T: Copy>(&self, recv: &[T], dst: &mut [T]) {
        for (&to, &v) in self.permutation.iter().zip(recv) {
            dst[to] = v;
        }
    }

    /// `dst[permutation[j]] += recv[j]`, in slot order.
    pub fn scatter_add<T: Copy + AddAssign>(&self, recv: &[T], dst: &mut [T]) {
        for (&to, &v) in self.permutation.iter().zip(recv) {
            dst[to] += v;
        }
    }

    /// One payload round: `send` in send order to `recv` in receive order.
    pub fn exchange<G: ProcessGroup, T: Pod>(
        &self,
        group: &G,
        send: &[T],
        recv: &mut [T],
        tag: CommTag,
    ) -> Result<(), BasisError> {
        group.all_to_all_v(send, &self.send, recv, &self.recv, tag)
    }

    /// Whether the permutation hits every destination index exactly once.
    pub fn check_bijection(&self) -> Result<(), BasisError> {
        if self.permutation.len() != self.target_len {
            return Err(BasisError::LengthMismatch {
                what: "plan permutation",
                expected: self.target_len,
                found: self.permutation.len(),
            });
        }
        check_is_permutation("plan permutation", &self.permutation)
    }
}

fn check_is_permutation(what: &'static str, v: &[usize]) -> Result<(), BasisError> {
    let mut seen = vec![false; v.len()];
    for &x in v {
        match seen.get_mut(x) {
            Some(s) if !*s => *s = true,
            _ => {
                return Err(BasisError::LengthMismatch {
                    what,
                    expected: v.len(),
                    found: x,
                });
            }
        }
    }
    Ok(())
}

impl DebugInvariants for CommPlan {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "CommPlan");
    }

    fn validate_invariants(&self) -> Result<(), BasisError> {
        if !self.send.is_prefix() || !self.recv.is_prefix() {
            return Err(BasisError::CommError {
                neighbor: usize::MAX,
                message: "plan offsets are not exclusive prefix sums of the counts".into(),
            });
        }
        if self.send.total() != self.send_slot.len() {
            return Err(BasisError::LengthMismatch {
                what: "plan send slots",
                expected: self.send.total(),
                found: self.send_slot.len(),
            });
        }
        if self.recv.total() != self.permutation.len() {
            return Err(BasisError::LengthMismatch {
                what: "plan permutation",
                expected: self.recv.total(),
                found: self.permutation.len(),
            });
        }
        if let Some(&bad) = self.permutation.iter().find(|&&p| p >= self.target_len) {
            return Err(BasisError::LengthMismatch {
                what: "plan destination index",
                expected: self.target_len,
                found: bad,
            });
        }
        check_is_permutation("plan send slots", &self.send_slot)
    }
}
