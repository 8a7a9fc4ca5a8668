use crate::distance::DistanceMatrix;
use crate::parameters::COULOMB_CONSTANT;
use crate::registry::Cofactor;
use crate::state_space::StateSpace;
use ndarray::{Array1, ArrayView1};

/// Free energy (eV) of one microstate.
///
/// Each occupied cofactor contributes `-n·E(n)`, where `E(n)` is the
/// potential at its current level. Every ordered pair of distinct occupied
/// cofactors adds `k_C/ε_r/r·n_i·n_j`, so each unordered pair is counted
/// twice. The network builder rejects co-occupied pairs without a distance,
/// so a missing entry here only ever belongs to a pair that is never
/// occupied together.
pub fn free_energy(
    occupation: ArrayView1<usize>,
    cofactors: &[Cofactor],
    distances: &DistanceMatrix,
    relative_permittivity: f64,
) -> f64 {
    let mut energy = 0.;
    for (cofactor, &n) in cofactors.iter().zip(occupation.iter()) {
        if let Some(potential) = cofactor.potential(n) {
            energy -= n as f64 * potential;
        }
    }

    for (i, &n_i) in occupation.iter().enumerate() {
        if n_i == 0 {
            continue;
        }
        for (j, &n_j) in occupation.iter().enumerate() {
            if i == j || n_j == 0 {
                continue;
            }
            if let Some(r) = distances.get(i, j) {
                energy += COULOMB_CONSTANT / relative_permittivity / r * (n_i * n_j) as f64;
            }
        }
    }
    energy
}

/// Free energy of every compressed state, indexed like the state space.
pub fn state_free_energies(
    space: &StateSpace,
    cofactors: &[Cofactor],
    distances: &DistanceMatrix,
    relative_permittivity: f64,
) -> Array1<f64> {
    Array1::from_iter(space.occupations().outer_iter().map(|occupation| {
        free_energy(occupation, cofactors, distances, relative_permittivity)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn cofactors() -> Vec<Cofactor> {
        vec![
            Cofactor {
                name: "A".to_string(),
                redox: vec![-0.5, -0.9],
            },
            Cofactor {
                name: "B".to_string(),
                redox: vec![0.1],
            },
            Cofactor {
                name: "C".to_string(),
                redox: vec![-0.2],
            },
        ]
    }

    #[test]
    fn site_energies_without_neighbours() {
        let distances = DistanceMatrix::new(3);
        let energy = free_energy(arr1(&[2, 1, 0]).view(), &cofactors(), &distances, 8.);
        // -2·(-0.9) - 1·0.1
        assert!((energy - 1.7).abs() < 1e-12);
        let empty = free_energy(arr1(&[0, 0, 0]).view(), &cofactors(), &distances, 8.);
        assert_eq!(empty, 0.);
    }

    #[test]
    fn coulomb_counts_each_ordered_pair() {
        let distances = DistanceMatrix::from_entries(
            3,
            &[(0, 1, 10., true), (1, 2, 5., false), (0, 2, 12., false)],
        )
        .unwrap();
        let energy = free_energy(arr1(&[2, 1, 1]).view(), &cofactors(), &distances, 8.);
        let sites = 1.8 - 0.1 + 0.2;
        let coulomb = 2. * COULOMB_CONSTANT / 8. * (2. / 10. + 1. / 5. + 2. / 12.);
        assert!((energy - (sites + coulomb)).abs() < 1e-12);
    }
}
