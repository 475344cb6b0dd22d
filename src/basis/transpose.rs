//! Payload movement between the forward and transpose orderings.

use super::comm_plan::CommPlan;
use super::try_filled;
use crate::algs::collective::ProcessGroup;
use crate::algs::communicator::CommTag;
use crate::basis_error::BasisError;
use crate::operator::Coeff;

/// Send and receive scratch reused across transposes.
///
/// Sized once for the larger of the two directions, so a partition can run
/// any number of forward and backward transposes without allocating.
#[derive(Clone, Debug)]
pub struct TransposeBuffers<T> {
    send: Vec<T>,
    recv: Vec<T>,
}

impl<T: Coeff> TransposeBuffers<T> {
    pub fn for_plans(plans: &[&CommPlan], rank: usize) -> Result<Self, BasisError> {
        let n_send = plans.iter().map(|p| p.n_send()).max().unwrap_or(0);
        let n_recv = plans.iter().map(|p| p.n_recv()).max().unwrap_or(0);
        Ok(Self {
            send: try_filled(n_send, T::zero(), rank, "transpose send buffer")?,
            recv: try_filled(n_recv, T::zero(), rank, "transpose recv buffer")?,
        })
    }

    /// Elements held by both buffers.
    pub fn capacity(&self) -> usize {
        self.send.len() + self.recv.len()
    }
}

impl<T> Default for TransposeBuffers<T> {
    fn default() -> Self {
        Self {
            send: Vec::new(),
            recv: Vec::new(),
        }
    }
}

/// Move `input` (source layout of `plan`) into `output` (target layout).
pub(crate) fn run<G, T>(
    plan: &CommPlan,
    group: &G,
    input: &[T],
    output: &mut [T],
    bufs: &mut TransposeBuffers<T>,
    tag: CommTag,
) -> Result<(), BasisError>
where
    G: ProcessGroup,
    T: Coeff,
{
    if input.len() != plan.n_send() {
        return Err(BasisError::LengthMismatch {
            what: "transpose input",
            expected: plan.n_send(),
            found: input.len(),
        });
    }
    if output.len() != plan.target_len() {
        return Err(BasisError::LengthMismatch {
            what: "transpose output",
            expected: plan.target_len(),
            found: output.len(),
        });
    }
    if bufs.send.len() < plan.n_send() || bufs.recv.len() < plan.n_recv() {
        return Err(BasisError::LengthMismatch {
            what: "transpose buffers",
            expected: plan.n_send() + plan.n_recv(),
            found: bufs.capacity(),
        });
    }
    let send = &mut bufs.send[..plan.n_send()];
    let recv = &mut bufs.recv[..plan.n_recv()];
    plan.pack(input, send);
    plan.exchange(group, send, recv, tag)?;
    plan.scatter(recv, output);
    Ok(())
}
