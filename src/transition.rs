use crate::registry::{CofactorId, ReservoirId};
use crate::state_space::StateSpace;
use serde::{Deserialize, Serialize};

/// One elementary process that can connect two microstates.
///
/// Each variant describes its forward direction; the generator gets the
/// reverse direction from detailed balance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    /// `electrons` move from `donor` (at `donor_level` before) to `acceptor`
    /// (at `acceptor_level` before).
    ElectronTransfer {
        donor: CofactorId,
        donor_level: usize,
        acceptor: CofactorId,
        acceptor_level: usize,
        electrons: usize,
        distance: f64,
    },
    /// `electrons` leave `cofactor` at `source_level` into a reservoir.
    Reservoir {
        reservoir: ReservoirId,
        cofactor: CofactorId,
        source_level: usize,
        electrons: usize,
        delta_g: f64,
        rate: f64,
    },
}

impl Transition {
    pub fn single_electron(
        donor: CofactorId,
        donor_level: usize,
        acceptor: CofactorId,
        acceptor_level: usize,
        distance: f64,
    ) -> Self {
        Transition::ElectronTransfer {
            donor,
            donor_level,
            acceptor,
            acceptor_level,
            electrons: 1,
            distance,
        }
    }

    /// Compressed states the forward process can start from.
    pub fn initial_states(&self, space: &StateSpace) -> Vec<usize> {
        match *self {
            Transition::ElectronTransfer {
                donor,
                donor_level,
                acceptor,
                acceptor_level,
                ..
            } => space.states_with_both((donor.0, donor_level), (acceptor.0, acceptor_level)),
            Transition::Reservoir {
                cofactor,
                source_level,
                ..
            } => space.states_with(cofactor.0, source_level).to_vec(),
        }
    }

    /// Applies the forward process to an occupation vector. Returns `false`
    /// if the process cannot happen from it.
    pub fn apply(&self, occupation: &mut [usize]) -> bool {
        match *self {
            Transition::ElectronTransfer {
                donor,
                donor_level,
                acceptor,
                acceptor_level,
                electrons,
                ..
            } => {
                if occupation[donor.0] != donor_level
                    || occupation[acceptor.0] != acceptor_level
                    || donor_level < electrons
                {
                    return false;
                }
                occupation[donor.0] -= electrons;
                occupation[acceptor.0] += electrons;
                true
            }
            Transition::Reservoir {
                cofactor,
                source_level,
                electrons,
                ..
            } => {
                if occupation[cofactor.0] != source_level || source_level < electrons {
                    return false;
                }
                occupation[cofactor.0] -= electrons;
                true
            }
        }
    }

    /// Compressed `(initial, final)` pairs joined by the forward process.
    ///
    /// Every cofactor other than the ones the process touches keeps its
    /// occupancy. Final states outside the state space are dropped.
    pub fn state_pairs(&self, space: &StateSpace) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        let mut occupation = Vec::with_capacity(space.num_cofactors());
        for initial in self.initial_states(space) {
            occupation.clear();
            occupation.extend(space.occupation(initial).iter().copied());
            if !self.apply(&mut occupation) {
                continue;
            }
            if let Some(last) = space.index_of(&occupation) {
                pairs.push((initial, last));
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_pairs_keep_bystanders() {
        let space = StateSpace::build(vec![2, 1, 1], None, None).unwrap();
        let transfer = Transition::single_electron(CofactorId(0), 2, CofactorId(1), 0, 10.);
        let pairs = transfer.state_pairs(&space);
        // Cofactor 2 is either empty or full.
        assert_eq!(pairs.len(), 2);
        for (initial, last) in pairs {
            let before = space.occupation(initial);
            let after = space.occupation(last);
            assert_eq!((before[0], before[1]), (2, 0));
            assert_eq!((after[0], after[1]), (1, 1));
            assert_eq!(before[2], after[2]);
        }
    }

    #[test]
    fn transitions_leaving_the_space_are_dropped() {
        let space = StateSpace::build(vec![1, 1], Some(1), Some(1)).unwrap();
        let drain = Transition::Reservoir {
            reservoir: ReservoirId(0),
            cofactor: CofactorId(0),
            source_level: 1,
            electrons: 1,
            delta_g: 0.,
            rate: 1.,
        };
        assert!(drain.state_pairs(&space).is_empty());
    }

    #[test]
    fn multi_electron_transfer() {
        let space = StateSpace::build(vec![2, 2], Some(2), Some(2)).unwrap();
        let transfer = Transition::ElectronTransfer {
            donor: CofactorId(0),
            donor_level: 2,
            acceptor: CofactorId(1),
            acceptor_level: 0,
            electrons: 2,
            distance: 8.,
        };
        let pairs = transfer.state_pairs(&space);
        assert_eq!(pairs.len(), 1);
        let (initial, last) = pairs[0];
        assert_eq!(space.occupation(initial).to_vec(), vec![2, 0]);
        assert_eq!(space.occupation(last).to_vec(), vec![0, 2]);
    }
}
