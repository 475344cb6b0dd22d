//! Point-to-point message passing between the ranks of a process group.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! All handles are **waitable** but non-blocking: the collectives in
//! [`collective`](super::collective) call `.wait()` before they trust that a
//! buffer is ready.
//!
//! Two backends implement point-to-point messaging: [`NoComm`] for a single
//! rank and [`ThreadComm`], which runs every rank of a group on its own thread
//! inside one process. `MpiComm` (feature `mpi-support`) skips this layer and
//! maps the collectives straight onto MPI.

use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Typed message tag. Collectives derive the tags of their rounds with
/// [`CommTag::offset`], so one base tag per caller is enough.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        CommTag(tag)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn offset(self, by: u16) -> Self {
        CommTag(self.0.wrapping_add(by))
    }
}

/// Non-blocking point-to-point messaging.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of `buf.len()` bytes. The data is handed back by
    /// [`Wait::wait`]; `buf` only fixes the expected length.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Abort code if some member tore the group down.
    fn aborted(&self) -> Option<i32> {
        None
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Single-rank group. Every collective degenerates to a local copy, so no
/// message is ever posted.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
}

// --- ThreadComm: one rank per thread, shared mailbox ---
type Key = (usize, usize, u16); // (src, dst, tag)

#[derive(Debug, Default)]
struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
    aborted: AtomicBool,
    abort_code: AtomicI32,
}

/// In-process process group: each member is meant to be driven by its own
/// thread. Messages with the same `(src, dst, tag)` are delivered in send
/// order.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl ThreadComm {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// All members of a fresh group of `size` ranks, indexed by rank.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }

    /// Tear the group down: every pending and future receive fails.
    pub fn abort(&self, code: i32) {
        self.mailbox.abort_code.store(code, Ordering::SeqCst);
        self.mailbox.aborted.store(true, Ordering::SeqCst);
    }

    /// Number of posted messages nobody has received yet.
    pub fn pending_messages(&self) -> usize {
        self.mailbox.slots.iter().map(|e| e.value().len()).sum()
    }
}

pub struct ThreadRecv {
    mailbox: Arc<Mailbox>,
    key: Key,
}

impl Wait for ThreadRecv {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            {
                if let Some(mut queue) = self.mailbox.slots.get_mut(&self.key) {
                    if let Some(bytes) = queue.pop_front() {
                        return Some(bytes.to_vec());
                    }
                }
            }
            if self.mailbox.aborted.load(Ordering::SeqCst) {
                return None;
            }
            std::thread::yield_now();
        }
    }
}

impl Communicator for ThreadComm {
    type SendHandle = ();
    type RecvHandle = ThreadRecv;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        let key = (self.rank, peer, tag);
        self.mailbox
            .slots
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> ThreadRecv {
        ThreadRecv {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
        }
    }

    fn aborted(&self) -> Option<i32> {
        self.mailbox
            .aborted
            .load(Ordering::SeqCst)
            .then(|| self.mailbox.abort_code.load(Ordering::SeqCst))
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use crate::algs::collective::{BlockLayout, ProcessGroup, check_layouts};
    use crate::algs::communicator::CommTag;
    use crate::basis_error::BasisError;
    use mpi::datatype::{Partition, PartitionMut};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use mpi::Count;

    /// Process group over an MPI communicator.
    ///
    /// MPI must already be initialized and the `Universe` kept alive by the
    /// driver for as long as this group is used.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }

        /// `MPI_COMM_WORLD`.
        pub fn world() -> Self {
            Self::new(SimpleCommunicator::world())
        }
    }

    fn to_counts(layout: &BlockLayout) -> Result<(Vec<Count>, Vec<Count>), BasisError> {
        let convert = |v: &[usize]| {
            v.iter()
                .map(|&x| {
                    Count::try_from(x).map_err(|_| BasisError::CommError {
                        neighbor: usize::MAX,
                        message: format!("{x} bytes exceed the MPI count range"),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        };
        Ok((convert(layout.counts())?, convert(layout.offsets())?))
    }

    impl ProcessGroup for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn all_to_all_bytes(
            &self,
            send: &[u8],
            send_layout: &BlockLayout,
            recv: &mut [u8],
            recv_layout: &BlockLayout,
            _tag: CommTag,
        ) -> Result<(), BasisError> {
            check_layouts(self.size, send.len(), send_layout, recv.len(), recv_layout)?;
            let (send_counts, send_displs) = to_counts(send_layout)?;
            let (recv_counts, recv_displs) = to_counts(recv_layout)?;
            let send_part = Partition::new(send, send_counts, send_displs);
            let mut recv_part = PartitionMut::new(recv, recv_counts, recv_displs);
            self.world.all_to_all_varcount_into(&send_part, &mut recv_part);
            Ok(())
        }

        fn all_gather(&self, value: u64, _tag: CommTag) -> Result<Vec<u64>, BasisError> {
            let mut out = vec![0u64; self.size];
            self.world.all_gather_into(&value, &mut out[..]);
            Ok(out)
        }

        fn abort(&self, code: i32) {
            self.world.abort(code)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
