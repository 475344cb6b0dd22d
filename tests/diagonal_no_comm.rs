mod util;

use hilbert_sieve::prelude::*;
use util::{CountingGroup, coeff, local_vector, run_group};

#[test]
fn diagonal_and_same_sector_terms_stay_local() {
    let s = ElectronSector::<u32>::new(6, 3, 3).unwrap();
    let terms = || -> Vec<Box<dyn Term<u32, f64>>> {
        vec![
            Box::new(HubbardU { u: 4.0 }),
            Box::new(Coulomb { s1: 0, s2: 3, v: 0.5 }),
            Box::new(ChemicalPotential { site: 2, mu: 0.3 }),
            Box::new(Hopping::new(Sublattice::Dn, 1, 4, 1.0)),
        ]
    };
    let dense = DenseReference::<u32, f64>::new(&s, &terms()).unwrap();
    let x: Vec<f64> = dense.basis().iter().map(|&(u, d)| coeff(u, d)).collect();
    let y = dense.matvec(&x).unwrap();

    run_group(3, |comm| {
        let counted = CountingGroup::new(comm);
        let part = BasisPartition::new(s.clone(), &counted).unwrap();
        let mut op = DistributedOperator::new(&part, terms(), &counted).unwrap();
        assert!(!op.communicates());

        let before = counted.calls();
        let v: Vec<f64> = local_vector(&part);
        let mut w = vec![0.0; part.local_dim()];
        op.apply(&counted, &v, &mut w).unwrap();
        op.apply(&counted, &v, &mut w).unwrap();
        assert_eq!(counted.calls(), before, "diagonal apply touched the network");

        for (i, up, dn) in part.iter() {
            assert!((w[i] - y[dense.index_of(up, dn).unwrap()]).abs() < 1e-12);
        }
        assert_eq!(op.apply_stats().payload_exchanges, 0);
        assert_eq!(op.apply_stats().applies, 2);
    });
}

#[test]
fn cross_sector_terms_pay_one_round_trip() {
    let s = TjSector::<u16>::new(5, 2, 1).unwrap();
    run_group(2, |comm| {
        let counted = CountingGroup::new(comm);
        let part = BasisPartition::new(s.clone(), &counted).unwrap();
        let terms: Vec<Box<dyn Term<u16, f64>>> = vec![Box::new(Hopping::new(Sublattice::Up, 0, 2, 1.0))];
        let mut op = DistributedOperator::new(&part, terms, &counted).unwrap();
        let before = counted.exchanges.load(std::sync::atomic::Ordering::SeqCst);
        let v: Vec<f64> = local_vector(&part);
        let mut w = vec![0.0; part.local_dim()];
        op.apply(&counted, &v, &mut w).unwrap();
        let after = counted.exchanges.load(std::sync::atomic::Ordering::SeqCst);
        assert_eq!(after - before, 2);
        assert_eq!(op.apply_stats().transposes, 2);
    });
}

#[test]
fn invalid_terms_fail_before_communication() {
    let s = SpinhalfSector::<u16>::new(6, 3).unwrap();
    run_group(2, |comm| {
        let counted = CountingGroup::new(comm);
        let part = BasisPartition::new(s.clone(), &counted).unwrap();
        let before = counted.calls();
        let terms: Vec<Box<dyn Term<u16, f64>>> = vec![Box::new(SpinIsing::on(&s, 0, 6, 1.0))];
        assert!(matches!(
            DistributedOperator::new(&part, terms, &counted),
            Err(BasisError::InvalidTerm(_))
        ));
        assert_eq!(counted.calls(), before);
    });
}
