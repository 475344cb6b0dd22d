#![allow(dead_code)]
use hilbert_sieve::{
    algs::collective::{BlockLayout, ProcessGroup},
    algs::communicator::{CommTag, ThreadComm},
    algs::ownership::fmix64,
    basis::BasisPartition,
    basis_error::BasisError,
    bits::BitPattern,
    operator::{Coeff, DenseReference, DistributedOperator, Term},
    sector::ProductSector,
};
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Run `f` once per member of a fresh `size`-rank thread group and collect
/// the results by rank. A panicking rank aborts the group so its peers do
/// not wait forever; the first panic is re-raised.
pub fn run_group<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(&ThreadComm) -> R + Sync,
{
    let group = ThreadComm::group(size);
    std::thread::scope(|s| {
        let handles: Vec<_> = group
            .iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || match catch_unwind(AssertUnwindSafe(|| f(comm))) {
                    Ok(r) => r,
                    Err(e) => {
                        comm.abort(99);
                        resume_unwind(e)
                    }
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| resume_unwind(e)))
            .collect()
    })
}

/// Process group that counts the collectives it forwards.
pub struct CountingGroup<'a, G> {
    inner: &'a G,
    pub exchanges: AtomicUsize,
    pub gathers: AtomicUsize,
}

impl<'a, G: ProcessGroup> CountingGroup<'a, G> {
    pub fn new(inner: &'a G) -> Self {
        Self {
            inner,
            exchanges: AtomicUsize::new(0),
            gathers: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst) + self.gathers.load(Ordering::SeqCst)
    }
}

impl<G: ProcessGroup> ProcessGroup for CountingGroup<'_, G> {
    fn rank(&self) -> usize {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn all_to_all_bytes(
        &self,
        send: &[u8],
        send_layout: &BlockLayout,
        recv: &mut [u8],
        recv_layout: &BlockLayout,
        tag: CommTag,
    ) -> Result<(), BasisError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        self.inner
            .all_to_all_bytes(send, send_layout, recv, recv_layout, tag)
    }

    fn all_gather(&self, value: u64, tag: CommTag) -> Result<Vec<u64>, BasisError> {
        self.gathers.fetch_add(1, Ordering::SeqCst);
        self.inner.all_gather(value, tag)
    }

    fn abort(&self, code: i32) {
        self.inner.abort(code)
    }
}

/// Deterministic pseudo-random coefficient of a configuration pair, in
/// `[-0.5, 0.5)` per component.
pub fn coeff<B: BitPattern, T: Coeff>(up: B, dn: B) -> T {
    let h = fmix64(up.to_u64() ^ dn.to_u64().rotate_left(32) ^ 0x9e37_79b9_7f4a_7c15);
    let unit = |x: u64| (x >> 11) as f64 / (1u64 << 53) as f64 - 0.5;
    T::from_parts(unit(h), unit(fmix64(h)))
}

/// Local forward-ordered vector filled with [`coeff`].
pub fn local_vector<S: ProductSector, T: Coeff>(part: &BasisPartition<S>) -> Vec<T> {
    part.iter().map(|(_, up, dn)| coeff(up, dn)).collect()
}

/// Apply `terms` distributed over `n_ranks` ranks and compare every rank's
/// share against the dense reference product.
pub fn check_apply_matches_dense<S, T, F>(sector: S, n_ranks: usize, terms: F, tol: f64)
where
    S: ProductSector,
    T: Coeff,
    F: Fn() -> Vec<Box<dyn Term<S::Bits, T>>> + Sync,
{
    let dense = DenseReference::<S::Bits, T>::new(&sector, &terms()).unwrap();
    assert!(dense.is_hermitian(1e-12), "reference matrix is not hermitian");
    let x: Vec<T> = dense.basis().iter().map(|&(u, d)| coeff(u, d)).collect();
    let y = dense.matvec(&x).unwrap();

    run_group(n_ranks, |comm| {
        let part = BasisPartition::new(sector.clone(), comm).unwrap();
        let mut op = DistributedOperator::new(&part, terms(), comm).unwrap();
        let input: Vec<T> = local_vector(&part);
        let mut out = vec![T::from_f64(0.0); part.local_dim()];
        op.apply(comm, &input, &mut out).unwrap();
        for (i, up, dn) in part.iter() {
            let g = dense.index_of(up, dn).unwrap();
            let err = (out[i] + -y[g]).abs();
            assert!(
                err <= tol,
                "rank {} of {n_ranks}: pair ({up:?}, {dn:?}) got {:?}, want {:?}",
                comm.rank(),
                out[i],
                y[g]
            );
        }
    });
}

/// Like [`check_apply_matches_dense`] for an operator from `sector` onto
/// `sector_out`.
pub fn check_between_matches_dense<S, T, F>(sector: S, sector_out: S, n_ranks: usize, terms: F, tol: f64)
where
    S: ProductSector,
    T: Coeff,
    F: Fn() -> Vec<Box<dyn Term<S::Bits, T>>> + Sync,
{
    let dense = DenseReference::<S::Bits, T>::between(&sector, &sector_out, &terms()).unwrap();
    let x: Vec<T> = dense.basis().iter().map(|&(u, d)| coeff(u, d)).collect();
    let y = dense.matvec(&x).unwrap();

    run_group(n_ranks, |comm| {
        let part = BasisPartition::new(sector.clone(), comm).unwrap();
        let part_out = BasisPartition::new(sector_out.clone(), comm).unwrap();
        let mut op = DistributedOperator::between(&part, &part_out, terms(), comm).unwrap();
        let input: Vec<T> = local_vector(&part);
        let mut out = vec![T::from_f64(0.0); part_out.local_dim()];
        op.apply(comm, &input, &mut out).unwrap();
        for (i, up, dn) in part_out.iter() {
            let g = dense.index_of_out(up, dn).unwrap();
            let err = (out[i] + -y[g]).abs();
            assert!(
                err <= tol,
                "rank {} of {n_ranks}: pair ({up:?}, {dn:?}) got {:?}, want {:?}",
                comm.rank(),
                out[i],
                y[g]
            );
        }
    });
}
