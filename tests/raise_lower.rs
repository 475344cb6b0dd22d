//! Creation and annihilation operators between neighbouring sectors.

mod util;

use hilbert_sieve::prelude::*;
use num_complex::Complex64;
use util::{check_between_matches_dense, local_vector, run_group};

type Part = BasisPartition<ElectronSector<u16>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Ladder {
    RaiseUp,
    RaiseDn,
    LowerUp,
    LowerDn,
}

impl Ladder {
    const ALL: [Ladder; 4] = [Ladder::RaiseUp, Ladder::RaiseDn, Ladder::LowerUp, Ladder::LowerDn];

    fn shift(self) -> (isize, isize) {
        match self {
            Ladder::RaiseUp => (1, 0),
            Ladder::RaiseDn => (0, 1),
            Ladder::LowerUp => (-1, 0),
            Ladder::LowerDn => (0, -1),
        }
    }

    fn term(self, site: usize) -> Box<dyn Term<u16, f64>> {
        match self {
            Ladder::RaiseUp => Box::new(Raise::new(Sublattice::Up, site, 1.0)),
            Ladder::RaiseDn => Box::new(Raise::new(Sublattice::Dn, site, 1.0)),
            Ladder::LowerUp => Box::new(Lower::new(Sublattice::Up, site, 1.0)),
            Ladder::LowerDn => Box::new(Lower::new(Sublattice::Dn, site, 1.0)),
        }
    }

    fn conjugate(self) -> Ladder {
        match self {
            Ladder::RaiseUp => Ladder::LowerUp,
            Ladder::RaiseDn => Ladder::LowerDn,
            Ladder::LowerUp => Ladder::RaiseUp,
            Ladder::LowerDn => Ladder::RaiseDn,
        }
    }
}

/// Every particle-number sector of an `n`-site lattice, indexed `[n_up][n_dn]`.
fn all_sectors<G: ProcessGroup>(n: usize, comm: &G) -> Vec<Vec<Part>> {
    (0..=n)
        .map(|n_up| {
            (0..=n)
                .map(|n_dn| {
                    BasisPartition::new(ElectronSector::new(n, n_up, n_dn).unwrap(), comm).unwrap()
                })
                .collect()
        })
        .collect()
}

fn shifted(n: usize, q: (usize, usize), op: Ladder) -> Option<(usize, usize)> {
    let (du, dd) = op.shift();
    let up = q.0.checked_add_signed(du).filter(|&x| x <= n)?;
    let dn = q.1.checked_add_signed(dd).filter(|&x| x <= n)?;
    Some((up, dn))
}

fn final_sector(n: usize, q: (usize, usize), a: Ladder, b: Ladder) -> Option<(usize, usize)> {
    let ((ua, da), (ub, db)) = (a.shift(), b.shift());
    let up = q.0.checked_add_signed(ua + ub).filter(|&x| x <= n)?;
    let dn = q.1.checked_add_signed(da + db).filter(|&x| x <= n)?;
    Some((up, dn))
}

/// Apply `op` on `site` to `v` living in sector `q`; returns the result and
/// its sector.
fn ladder<G: ProcessGroup>(
    comm: &G,
    parts: &[Vec<Part>],
    q: (usize, usize),
    op: Ladder,
    site: usize,
    v: &[f64],
) -> Option<((usize, usize), Vec<f64>)> {
    let n = parts.len() - 1;
    let to = shifted(n, q, op)?;
    let (from_part, to_part) = (&parts[q.0][q.1], &parts[to.0][to.1]);
    let mut h = DistributedOperator::between(from_part, to_part, vec![op.term(site)], comm).unwrap();
    let mut w = vec![0.0; to_part.local_dim()];
    h.apply(comm, v, &mut w).unwrap();
    Some((to, w))
}

fn max_diff(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

#[test]
fn product_states_are_built_from_the_vacuum() {
    for (n, p) in [(2, 1), (3, 2), (4, 3)] {
        run_group(p, |comm| {
            let parts = all_sectors(n, comm);
            let vacuum: Vec<f64> = vec![1.0; parts[0][0].local_dim()];
            for up in 0u16..1 << n {
                for dn in 0u16..1 << n {
                    // c†_{up sites ascending} c†_{dn sites ascending} |0>
                    let mut q = (0, 0);
                    let mut v = vacuum.clone();
                    let dn_sites = (0..n).rev().filter(|&s| dn >> s & 1 == 1);
                    let up_sites = (0..n).rev().filter(|&s| up >> s & 1 == 1);
                    for (op, s) in dn_sites
                        .map(|s| (Ladder::RaiseDn, s))
                        .chain(up_sites.map(|s| (Ladder::RaiseUp, s)))
                    {
                        (q, v) = ladder(comm, &parts, q, op, s, &v).unwrap();
                    }
                    let part = &parts[q.0][q.1];
                    for (i, u, d) in part.iter() {
                        let want = if (u, d) == (up, dn) { 1.0 } else { 0.0 };
                        assert_eq!(v[i], want, "n={n} state ({up:#b}, {dn:#b}) at ({u:#b}, {d:#b})");
                    }
                }
            }
        });
    }
}

#[test]
fn anticommutation_relations() {
    for (n, p) in [(2, 1), (3, 2), (3, 3)] {
        run_group(p, |comm| {
            let parts = all_sectors(n, comm);
            for n_up in 0..=n {
                for n_dn in 0..=n {
                    let q = (n_up, n_dn);
                    let r: Vec<f64> = local_vector(&parts[n_up][n_dn]);
                    for i in 0..n {
                        for j in 0..n {
                            for a in Ladder::ALL {
                                for b in Ladder::ALL {
                                    let Some(q2) = final_sector(n, q, a, b) else {
                                        continue;
                                    };
                                    // a product leaving the lattice on the way is zero
                                    let zero = vec![0.0; parts[q2.0][q2.1].local_dim()];
                                    let x = ladder(comm, &parts, q, b, j, &r)
                                        .and_then(|(q1, v)| ladder(comm, &parts, q1, a, i, &v))
                                        .map_or_else(|| zero.clone(), |(_, v)| v);
                                    let y = ladder(comm, &parts, q, a, i, &r)
                                        .and_then(|(q1, v)| ladder(comm, &parts, q1, b, j, &v))
                                        .map_or_else(|| zero.clone(), |(_, v)| v);
                                    let sum: Vec<f64> = x.iter().zip(&y).map(|(x, y)| x + y).collect();
                                    let want = if i == j && a == b.conjugate() {
                                        r.clone()
                                    } else {
                                        zero
                                    };
                                    assert!(
                                        max_diff(&sum, &want) < 1e-12,
                                        "{{{a:?}_{i}, {b:?}_{j}}} in sector {q:?}"
                                    );
                                }
                            }
                        }
                    }
                }
            }
        });
    }
}

#[test]
fn hopping_is_a_product_of_ladders() {
    let n = 4;
    run_group(2, |comm| {
        let parts = all_sectors(n, comm);
        for n_up in 1..n {
            for n_dn in [0, 2] {
                let q = (n_up, n_dn);
                let part = &parts[n_up][n_dn];
                let r: Vec<f64> = local_vector(part);
                for i in 0..n {
                    for j in (0..n).filter(|&j| j != i) {
                        let terms: Vec<Box<dyn Term<u16, f64>>> =
                            vec![Box::new(Hopping::new(Sublattice::Up, i, j, 1.0))];
                        let mut hop = DistributedOperator::new(part, terms, comm).unwrap();
                        let mut h = vec![0.0; part.local_dim()];
                        hop.apply(comm, &r, &mut h).unwrap();

                        let mut want = vec![0.0; part.local_dim()];
                        for (s1, s2) in [(i, j), (j, i)] {
                            let (q1, v) = ladder(comm, &parts, q, Ladder::LowerUp, s2, &r).unwrap();
                            let (q2, v) = ladder(comm, &parts, q1, Ladder::RaiseUp, s1, &v).unwrap();
                            assert_eq!(q2, q);
                            want.iter_mut().zip(&v).for_each(|(w, x)| *w -= x);
                        }
                        assert!(max_diff(&h, &want) < 1e-12, "hop {i}->{j} in sector {q:?}");
                    }
                }
            }
        }
    });
}

#[test]
fn tj_ladders_match_dense() {
    let s = TjSector::<u32>::new(5, 2, 1).unwrap();
    for p in [1, 2, 4] {
        // raising onto an up-occupied site leaves the t-J space
        let out = TjSector::<u32>::new(5, 2, 2).unwrap();
        check_between_matches_dense(
            s.clone(),
            out,
            p,
            || -> Vec<Box<dyn Term<u32, f64>>> {
                vec![
                    Box::new(Raise::new(Sublattice::Dn, 0, 0.5)),
                    Box::new(Raise::new(Sublattice::Dn, 3, -1.5)),
                ]
            },
            1e-12,
        );
        let out = TjSector::<u32>::new(5, 1, 1).unwrap();
        check_between_matches_dense(
            s.clone(),
            out,
            p,
            || -> Vec<Box<dyn Term<u32, Complex64>>> {
                vec![
                    Box::new(Lower::new(Sublattice::Up, 1, Complex64::new(0.3, 0.4))),
                    Box::new(Lower::new(Sublattice::Up, 4, Complex64::new(-1.0, 0.2))),
                ]
            },
            1e-12,
        );
    }
}

#[test]
fn electron_ladders_match_dense() {
    let s = ElectronSector::<u16>::new(5, 2, 3).unwrap();
    let out = ElectronSector::<u16>::new(5, 3, 3).unwrap();
    for p in [1, 3] {
        check_between_matches_dense(
            s.clone(),
            out.clone(),
            p,
            || -> Vec<Box<dyn Term<u16, f64>>> {
                vec![
                    Box::new(Raise::new(Sublattice::Up, 0, 1.0)),
                    Box::new(Raise::new(Sublattice::Up, 4, 0.25)),
                    Box::new(Raise::new(Sublattice::Up, 2, -0.5)),
                ]
            },
            1e-12,
        );
    }
}

#[test]
fn mismatched_lattices_are_rejected() {
    let a = BasisPartition::new(ElectronSector::<u16>::new(4, 1, 1).unwrap(), &NoComm).unwrap();
    let b = BasisPartition::new(ElectronSector::<u16>::new(5, 2, 1).unwrap(), &NoComm).unwrap();
    let terms: Vec<Box<dyn Term<u16, f64>>> = vec![Box::new(Raise::new(Sublattice::Up, 0, 1.0))];
    assert!(matches!(
        DistributedOperator::between(&a, &b, terms, &NoComm),
        Err(BasisError::InvalidSector(_))
    ));
}
