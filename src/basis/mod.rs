//! Distributed basis: local orderings, communication plans and transposes.

pub mod comm_plan;
pub mod ordering;
pub mod partition;
pub mod transpose;

pub use comm_plan::CommPlan;
pub use ordering::LocalOrdering;
pub use partition::BasisPartition;
pub use transpose::TransposeBuffers;

use crate::basis_error::BasisError;

/// `vec![fill; n]` that reports allocation failure instead of aborting.
pub(crate) fn try_filled<T: Clone>(
    n: usize,
    fill: T,
    rank: usize,
    what: &'static str,
) -> Result<Vec<T>, BasisError> {
    let mut v = Vec::new();
    v.try_reserve_exact(n).map_err(|_| BasisError::Allocation {
        rank,
        requested: n,
        what,
    })?;
    v.resize(n, fill);
    Ok(v)
}
