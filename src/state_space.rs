use crate::error::{KineticsError, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Mixed-radix numbering of occupation vectors.
///
/// Cofactor `i` contributes a digit in base `capacity_i + 1`, least
/// significant first. Every raw index below [`StateSpace::num_raw_states`]
/// is a distinct occupation vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSpace {
    capacities: Vec<usize>,
    num_raw_states: usize,

    min_electrons: usize,
    max_electrons: usize,

    /// Raw index of each compressed state, ascending.
    allowed: Vec<usize>,
    /// Compressed index of each raw state, if it is allowed.
    compressed: Vec<Option<usize>>,
    /// One row per compressed state.
    occupations: Array2<usize>,
    /// `levels[cofactor][level]` lists the compressed states in which
    /// `cofactor` holds `level` electrons, ascending.
    levels: Vec<Vec<Vec<usize>>>,
}

/*
 * Mixed-radix encoding
 */
pub fn encode(capacities: &[usize], occupation: &[usize]) -> usize {
    let mut index = 0;
    let mut stride = 1;
    for (&capacity, &n) in capacities.iter().zip(occupation.iter()) {
        index += n * stride;
        stride *= capacity + 1;
    }
    index
}

pub fn decode(capacities: &[usize], mut index: usize) -> Vec<usize> {
    let mut occupation = Vec::with_capacity(capacities.len());
    for &capacity in capacities {
        occupation.push(index % (capacity + 1));
        index /= capacity + 1;
    }
    occupation
}

/// Product of `capacity + 1` over all cofactors, or an error if it does not
/// fit in `usize`.
pub fn num_raw_states(capacities: &[usize]) -> Result<usize> {
    capacities.iter().try_fold(1_usize, |count, &capacity| {
        capacity
            .checked_add(1)
            .and_then(|radix| count.checked_mul(radix))
            .ok_or_else(|| {
                KineticsError::InvalidParameter(format!(
                    "capacities {:?} give more microstates than can be indexed",
                    capacities
                ))
            })
    })
}

/*
 * Constructors
 */
impl StateSpace {
    /// Keeps every occupation vector whose total lies in
    /// `[min_electrons, max_electrons]`. `None` bounds default to 0 and the
    /// total capacity.
    pub fn build(
        capacities: Vec<usize>,
        min_electrons: Option<usize>,
        max_electrons: Option<usize>,
    ) -> Result<Self> {
        let total_capacity: usize = capacities.iter().sum();
        let min_electrons = min_electrons.unwrap_or(0);
        let max_electrons = max_electrons.unwrap_or(total_capacity);
        let num_raw_states = num_raw_states(&capacities)?;

        let mut allowed = Vec::new();
        let mut compressed = vec![None; num_raw_states];
        let mut rows = Vec::new();
        for raw in 0..num_raw_states {
            let occupation = decode(&capacities, raw);
            let electrons: usize = occupation.iter().sum();
            if electrons < min_electrons || electrons > max_electrons {
                continue;
            }
            compressed[raw] = Some(allowed.len());
            allowed.push(raw);
            rows.extend(occupation);
        }

        if allowed.is_empty() {
            return Err(KineticsError::EmptyStateSpace {
                min: min_electrons,
                max: max_electrons,
            });
        }

        let occupations = Array2::from_shape_vec((allowed.len(), capacities.len()), rows)
            .map_err(|err| KineticsError::InvalidParameter(err.to_string()))?;

        let mut levels: Vec<Vec<Vec<usize>>> = capacities
            .iter()
            .map(|&capacity| vec![Vec::new(); capacity + 1])
            .collect();
        for (state, occupation) in occupations.outer_iter().enumerate() {
            for (cofactor, &level) in occupation.iter().enumerate() {
                levels[cofactor][level].push(state);
            }
        }

        Ok(StateSpace {
            capacities,
            num_raw_states,
            min_electrons,
            max_electrons,
            allowed,
            compressed,
            occupations,
            levels,
        })
    }
}

/*
 * Access to data
 */
impl StateSpace {
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn num_raw_states(&self) -> usize {
        self.num_raw_states
    }

    pub fn num_cofactors(&self) -> usize {
        self.capacities.len()
    }

    pub fn capacities(&self) -> &[usize] {
        &self.capacities
    }

    pub fn electron_bounds(&self) -> (usize, usize) {
        (self.min_electrons, self.max_electrons)
    }

    pub fn occupation(&self, state: usize) -> ArrayView1<'_, usize> {
        self.occupations.row(state)
    }

    pub fn occupations(&self) -> &Array2<usize> {
        &self.occupations
    }

    pub fn raw_index(&self, state: usize) -> usize {
        self.allowed[state]
    }

    /// Compressed index of an occupation vector, if it is in the space.
    pub fn index_of(&self, occupation: &[usize]) -> Option<usize> {
        if occupation.len() != self.capacities.len()
            || occupation
                .iter()
                .zip(self.capacities.iter())
                .any(|(n, capacity)| n > capacity)
        {
            return None;
        }
        self.compressed[encode(&self.capacities, occupation)]
    }

    /// Compressed states in which `cofactor` holds exactly `level` electrons.
    pub fn states_with(&self, cofactor: usize, level: usize) -> &[usize] {
        self.levels
            .get(cofactor)
            .and_then(|levels| levels.get(level))
            .map(|states| states.as_slice())
            .unwrap_or(&[])
    }

    /// Compressed states matching two cofactor levels at once.
    pub fn states_with_both(
        &self,
        first: (usize, usize),
        second: (usize, usize),
    ) -> Vec<usize> {
        intersect(
            self.states_with(first.0, first.1),
            self.states_with(second.0, second.1),
        )
    }

    pub fn total_electrons(&self, state: usize) -> usize {
        self.occupations.row(state).sum()
    }
}

/// Intersection of two ascending index lists.
pub fn intersect(left: &[usize], right: &[usize]) -> Vec<usize> {
    let mut both = Vec::with_capacity(left.len().min(right.len()));
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if left[i] < right[j] {
            i += 1;
        } else if left[i] > right[j] {
            j += 1;
        } else {
            both.push(left[i]);
            i += 1;
            j += 1;
        }
    }
    both
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_then_encode_round_trips() {
        for capacities in [vec![1], vec![1, 1], vec![2, 1, 3], vec![1, 0, 2, 2]] {
            for raw in 0..num_raw_states(&capacities).unwrap() {
                let occupation = decode(&capacities, raw);
                for (n, capacity) in occupation.iter().zip(capacities.iter()) {
                    assert!(n <= capacity);
                }
                assert_eq!(encode(&capacities, &occupation), raw);
            }
        }
    }

    #[test]
    fn first_cofactor_is_least_significant() {
        let capacities = [2, 1];
        assert_eq!(decode(&capacities, 0), vec![0, 0]);
        assert_eq!(decode(&capacities, 1), vec![1, 0]);
        assert_eq!(decode(&capacities, 3), vec![0, 1]);
        assert_eq!(decode(&capacities, 5), vec![2, 1]);
    }

    #[test]
    fn filters_by_electron_count() {
        let space = StateSpace::build(vec![1, 1, 1], Some(1), Some(2)).unwrap();
        assert_eq!(space.num_raw_states(), 8);
        assert_eq!(space.len(), 6);
        for state in 0..space.len() {
            let electrons = space.total_electrons(state);
            assert!((1..=2).contains(&electrons));
            let occupation = space.occupation(state).to_vec();
            assert_eq!(space.index_of(&occupation), Some(state));
            assert_eq!(encode(space.capacities(), &occupation), space.raw_index(state));
        }
        assert_eq!(space.index_of(&[0, 0, 0]), None);
        assert_eq!(space.index_of(&[1, 1, 1]), None);
        assert_eq!(space.index_of(&[2, 0, 0]), None);
    }

    #[test]
    fn default_bounds_keep_everything() {
        let space = StateSpace::build(vec![2, 1], None, None).unwrap();
        assert_eq!(space.len(), 6);
        assert_eq!(space.electron_bounds(), (0, 3));
    }

    #[test]
    fn level_sets_partition_states() {
        let space = StateSpace::build(vec![2, 1, 1], None, Some(3)).unwrap();
        for cofactor in 0..3 {
            let total: usize = (0..=space.capacities()[cofactor])
                .map(|level| space.states_with(cofactor, level).len())
                .sum();
            assert_eq!(total, space.len());
        }
        for &state in space.states_with_both((0, 2), (2, 1)).iter() {
            assert_eq!(space.occupation(state)[0], 2);
            assert_eq!(space.occupation(state)[2], 1);
        }
        assert!(space.states_with(0, 5).is_empty());
    }

    #[test]
    fn oversized_space_is_an_error() {
        assert_eq!(num_raw_states(&[3, 3, 3]).unwrap(), 64);
        let capacities = vec![usize::MAX / 2; 3];
        assert!(matches!(
            num_raw_states(&capacities),
            Err(KineticsError::InvalidParameter(_))
        ));
        assert!(matches!(
            num_raw_states(&[usize::MAX]),
            Err(KineticsError::InvalidParameter(_))
        ));
        assert!(matches!(
            StateSpace::build(vec![1; 70], Some(1), Some(1)),
            Err(KineticsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn empty_space_is_an_error() {
        assert!(matches!(
            StateSpace::build(vec![1, 1], Some(3), None),
            Err(KineticsError::EmptyStateSpace { min: 3, max: 2 })
        ));
    }

    #[test]
    fn intersection() {
        assert_eq!(intersect(&[1, 3, 5, 7], &[2, 3, 4, 7, 9]), vec![3, 7]);
        assert!(intersect(&[], &[1]).is_empty());
    }
}
