use crate::error::{KineticsError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Symmetric cofactor-cofactor distances (Å).
///
/// Every known distance enters the Coulomb correction. Only pairs flagged as
/// connected also exchange electrons directly. A zero entry means the
/// distance was never supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceMatrix {
    distances: Array2<f64>,
    connected: Array2<bool>,
}

impl DistanceMatrix {
    pub fn new(num_cofactors: usize) -> Self {
        DistanceMatrix {
            distances: Array2::zeros((num_cofactors, num_cofactors)),
            connected: Array2::from_elem((num_cofactors, num_cofactors), false),
        }
    }

    /// Builds the dense matrix from `(first, second, distance, connected)`
    /// entries. A later distance for the same pair replaces the earlier one,
    /// but a distance-only entry never removes a transfer pathway.
    pub fn from_entries(
        num_cofactors: usize,
        entries: &[(usize, usize, f64, bool)],
    ) -> Result<Self> {
        let mut matrix = DistanceMatrix::new(num_cofactors);
        for &(first, second, distance, connected) in entries {
            matrix.set(first, second, distance, connected)?;
        }
        Ok(matrix)
    }

    pub fn set(&mut self, first: usize, second: usize, distance: f64, connected: bool) -> Result<()> {
        check_pair(self.distances.nrows(), first, second, distance)?;
        self.distances[[first, second]] = distance;
        self.distances[[second, first]] = distance;
        let connected = connected || self.connected[[first, second]];
        self.connected[[first, second]] = connected;
        self.connected[[second, first]] = connected;
        Ok(())
    }

    pub fn get(&self, first: usize, second: usize) -> Option<f64> {
        let distance = self.distances[[first, second]];
        if distance > 0. {
            Some(distance)
        } else {
            None
        }
    }

    pub fn is_connected(&self, first: usize, second: usize) -> bool {
        self.connected[[first, second]]
    }

    /// Connected pairs `(i, j, distance)` with `i < j`.
    pub fn connections(&self) -> Vec<(usize, usize, f64)> {
        let n = self.distances.nrows();
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if self.connected[[i, j]] {
                    pairs.push((i, j, self.distances[[i, j]]));
                }
            }
        }
        pairs
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.distances
    }

    pub fn len(&self) -> usize {
        self.distances.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.nrows() == 0
    }
}

pub fn check_pair(num_cofactors: usize, first: usize, second: usize, distance: f64) -> Result<()> {
    for id in [first, second] {
        if id >= num_cofactors {
            return Err(KineticsError::UnknownCofactor(format!("id {}", id)));
        }
    }
    if first == second || !(distance.is_finite() && distance > 0.) {
        return Err(KineticsError::InvalidDistance {
            first,
            second,
            distance,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_and_sparse_connectivity() {
        let matrix = DistanceMatrix::from_entries(
            3,
            &[(0, 1, 10., true), (1, 2, 7.5, true), (0, 2, 17.5, false)],
        )
        .unwrap();
        assert_eq!(matrix.get(1, 0), Some(10.));
        assert_eq!(matrix.get(2, 0), Some(17.5));
        assert!(matrix.is_connected(2, 1));
        assert!(!matrix.is_connected(0, 2));
        assert_eq!(matrix.connections(), vec![(0, 1, 10.), (1, 2, 7.5)]);
    }

    #[test]
    fn distance_only_entry_keeps_pathway() {
        let matrix =
            DistanceMatrix::from_entries(2, &[(0, 1, 10., true), (1, 0, 12., false)]).unwrap();
        assert!(matrix.is_connected(0, 1));
        assert_eq!(matrix.get(0, 1), Some(12.));
    }

    #[test]
    fn missing_pairs_have_no_distance() {
        let matrix = DistanceMatrix::from_entries(3, &[(0, 1, 10., true)]).unwrap();
        assert_eq!(matrix.get(0, 2), None);
        assert_eq!(matrix.get(1, 1), None);
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(matches!(
            DistanceMatrix::from_entries(2, &[(0, 1, -1., true)]),
            Err(KineticsError::InvalidDistance { .. })
        ));
        assert!(matches!(
            DistanceMatrix::from_entries(2, &[(0, 0, 5., true)]),
            Err(KineticsError::InvalidDistance { .. })
        ));
        assert!(matches!(
            DistanceMatrix::from_entries(2, &[(0, 4, 5., true)]),
            Err(KineticsError::UnknownCofactor(_))
        ));
    }
}
