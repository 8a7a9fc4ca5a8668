use crate::distance::{check_pair, DistanceMatrix};
use crate::error::{KineticsError, Result};
use crate::free_energy::state_free_energies;
use crate::parameters::MarcusParameters;
use crate::rate_matrix::{assemble, RateMatrix, TransitionMask};
use crate::registry::{CofactorId, Registry, ReservoirId};
use crate::state_space::StateSpace;
use crate::transition::Transition;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Collects cofactors, distances, reservoirs and electron bounds.
///
/// Nothing is enumerated until [`NetworkBuilder::build`], which can be called
/// any number of times; every call produces an independent [`Network`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkBuilder {
    registry: Registry,
    distances: Vec<(usize, usize, f64, bool)>,
    multi_electron: Vec<MultiElectronTransfer>,
    min_electrons: Option<usize>,
    max_electrons: Option<usize>,
    parameters: MarcusParameters,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct MultiElectronTransfer {
    donor: CofactorId,
    donor_level: usize,
    acceptor: CofactorId,
    acceptor_level: usize,
    electrons: usize,
}

/// A built network: the compressed state space and its generator.
#[derive(Debug, Clone)]
pub struct Network {
    registry: Registry,
    space: StateSpace,
    distances: DistanceMatrix,
    transitions: Vec<Transition>,
    energies: Array1<f64>,
    parameters: MarcusParameters,
    matrix: RateMatrix,
}

/// A nonzero jump of the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedPair {
    pub from: usize,
    pub to: usize,
    pub from_occupation: Vec<usize>,
    pub to_occupation: Vec<usize>,
    pub rate: f64,
}

/*
 * Constructors
 */
impl NetworkBuilder {
    pub fn new() -> Self {
        NetworkBuilder::default()
    }

    pub fn with_parameters(parameters: MarcusParameters) -> Self {
        NetworkBuilder {
            parameters,
            ..NetworkBuilder::default()
        }
    }

    pub fn parameters(&self) -> &MarcusParameters {
        &self.parameters
    }

    pub fn set_parameters(&mut self, parameters: MarcusParameters) {
        self.parameters = parameters;
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn add_cofactor(&mut self, name: &str, redox: Vec<f64>) -> Result<CofactorId> {
        self.registry.add_cofactor(name, redox)
    }

    /// Opens a transfer pathway between two cofactors at `distance` Å.
    pub fn add_connection(&mut self, first: CofactorId, second: CofactorId, distance: f64) -> Result<()> {
        check_pair(self.registry.num_cofactors(), first.0, second.0, distance)?;
        self.distances.push((first.0, second.0, distance, true));
        Ok(())
    }

    /// Records a distance for the Coulomb correction only.
    pub fn add_distance(&mut self, first: CofactorId, second: CofactorId, distance: f64) -> Result<()> {
        check_pair(self.registry.num_cofactors(), first.0, second.0, distance)?;
        self.distances.push((first.0, second.0, distance, false));
        Ok(())
    }

    pub fn add_reservoir(
        &mut self,
        name: &str,
        cofactor: CofactorId,
        source_level: usize,
        electrons: usize,
        delta_g: f64,
        rate: f64,
    ) -> Result<ReservoirId> {
        self.registry
            .add_reservoir(name, cofactor, source_level, electrons, delta_g, rate)
    }

    /// Adds a concerted transfer of `electrons` from `donor` (holding
    /// `donor_level`) to `acceptor` (holding `acceptor_level`). The two
    /// cofactors must already be connected.
    pub fn add_multi_electron_transfer(
        &mut self,
        donor: CofactorId,
        donor_level: usize,
        acceptor: CofactorId,
        acceptor_level: usize,
        electrons: usize,
    ) -> Result<()> {
        if electrons == 0 {
            return Err(KineticsError::InvalidParameter(
                "a transfer moves at least one electron".to_string(),
            ));
        }
        self.registry.check_level(donor, donor_level)?;
        self.registry.check_level(acceptor, acceptor_level + electrons)?;
        if donor_level < electrons {
            return Err(KineticsError::InvalidLevel {
                cofactor: donor.0,
                level: donor_level,
                capacity: self.registry.cofactor(donor)?.capacity(),
            });
        }
        if !self.is_connected(donor, acceptor) {
            return Err(KineticsError::NotConnected {
                donor: donor.0,
                acceptor: acceptor.0,
            });
        }
        self.multi_electron.push(MultiElectronTransfer {
            donor,
            donor_level,
            acceptor,
            acceptor_level,
            electrons,
        });
        Ok(())
    }

    fn is_connected(&self, first: CofactorId, second: CofactorId) -> bool {
        self.distances.iter().any(|&(i, j, _, connected)| {
            connected && ((i, j) == (first.0, second.0) || (j, i) == (first.0, second.0))
        })
    }

    pub fn set_electron_bounds(&mut self, min: usize, max: usize) {
        self.min_electrons = Some(min);
        self.max_electrons = Some(max);
    }

    pub fn set_min_electrons(&mut self, min: usize) {
        self.min_electrons = Some(min);
    }

    pub fn set_max_electrons(&mut self, max: usize) {
        self.max_electrons = Some(max);
    }

    /// Enumerates the state space, fills the distance matrix and assembles
    /// the generator, in that order.
    pub fn build(&self) -> Result<Network> {
        self.parameters.validate()?;
        if self.registry.num_cofactors() == 0 {
            return Err(KineticsError::InvalidParameter(
                "network has no cofactors".to_string(),
            ));
        }

        let space = StateSpace::build(
            self.registry.capacities(),
            self.min_electrons,
            self.max_electrons,
        )?;
        let distances = DistanceMatrix::from_entries(self.registry.num_cofactors(), &self.distances)?;
        check_coulomb_pairs(&space, &distances)?;
        let transitions = self.transitions(&distances)?;
        let energies = state_free_energies(
            &space,
            self.registry.cofactors(),
            &distances,
            self.parameters.relative_permittivity,
        );
        let matrix = assemble(&space, &transitions, &energies, &self.parameters)?;

        let absorbing = matrix.absorbing_states();
        if !absorbing.is_empty() {
            warn!(
                "{} of {} states have no outgoing rate: {:?}",
                absorbing.len(),
                space.len(),
                absorbing
            );
        }
        info!(
            "built network with {} cofactors, {} of {} states and {} transitions",
            self.registry.num_cofactors(),
            space.len(),
            space.num_raw_states(),
            transitions.len()
        );

        Ok(Network {
            registry: self.registry.clone(),
            space,
            distances,
            transitions,
            energies,
            parameters: self.parameters.clone(),
            matrix,
        })
    }

    /// Every single-electron step between connected cofactors, then the
    /// explicit multi-electron transfers, then the reservoirs.
    fn transitions(&self, distances: &DistanceMatrix) -> Result<Vec<Transition>> {
        let cofactors = self.registry.cofactors();
        let mut transitions = Vec::new();
        for (i, j, distance) in distances.connections() {
            for donor_level in 1..=cofactors[i].capacity() {
                for acceptor_level in 0..cofactors[j].capacity() {
                    transitions.push(Transition::single_electron(
                        CofactorId(i),
                        donor_level,
                        CofactorId(j),
                        acceptor_level,
                        distance,
                    ));
                }
            }
        }

        for transfer in self.multi_electron.iter() {
            let (donor, acceptor) = (transfer.donor.0, transfer.acceptor.0);
            let distance = match distances.get(donor, acceptor) {
                Some(distance) if distances.is_connected(donor, acceptor) => distance,
                _ => return Err(KineticsError::NotConnected { donor, acceptor }),
            };
            transitions.push(Transition::ElectronTransfer {
                donor: transfer.donor,
                donor_level: transfer.donor_level,
                acceptor: transfer.acceptor,
                acceptor_level: transfer.acceptor_level,
                electrons: transfer.electrons,
                distance,
            });
        }

        for (id, reservoir) in self.registry.reservoirs().iter().enumerate() {
            transitions.push(Transition::Reservoir {
                reservoir: ReservoirId(id),
                cofactor: reservoir.cofactor,
                source_level: reservoir.source_level,
                electrons: reservoir.electrons,
                delta_g: reservoir.delta_g,
                rate: reservoir.rate,
            });
        }
        Ok(transitions)
    }
}

/// Every pair of cofactors that is ever occupied at the same time needs a
/// distance for its Coulomb term.
fn check_coulomb_pairs(space: &StateSpace, distances: &DistanceMatrix) -> Result<()> {
    let n = space.num_cofactors();
    for first in 0..n {
        for second in first + 1..n {
            if distances.get(first, second).is_some() {
                continue;
            }
            let co_occupied = space
                .occupations()
                .outer_iter()
                .any(|occupation| occupation[first] > 0 && occupation[second] > 0);
            if co_occupied {
                return Err(KineticsError::MissingDistance { first, second });
            }
        }
    }
    Ok(())
}

/*
 * Derived networks
 */
impl Network {
    /// Same network with the masked jumps removed, for irreversible or
    /// unidirectional sub-pathways.
    pub fn masked(&self, masks: &[TransitionMask]) -> Result<Network> {
        let matrix = self.matrix.masked(masks)?;
        Ok(Network {
            matrix,
            ..self.clone()
        })
    }
}

/*
 * Access to data
 */
impl Network {
    pub fn num_states(&self) -> usize {
        self.space.len()
    }

    pub fn state_space(&self) -> &StateSpace {
        &self.space
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn rate_matrix(&self) -> &RateMatrix {
        &self.matrix
    }

    pub fn distances(&self) -> &DistanceMatrix {
        &self.distances
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn parameters(&self) -> &MarcusParameters {
        &self.parameters
    }

    /// Free energy (eV) of each compressed state.
    pub fn free_energies(&self) -> &Array1<f64> {
        &self.energies
    }

    pub fn delta_g(&self, initial: usize, last: usize) -> f64 {
        self.energies[last] - self.energies[initial]
    }

    pub fn cofactor_id(&self, name: &str) -> Result<CofactorId> {
        self.registry.cofactor_id(name)
    }

    pub fn reservoir_id(&self, name: &str) -> Result<ReservoirId> {
        self.registry.reservoir_id(name)
    }

    pub fn state_index(&self, occupation: &[usize]) -> Option<usize> {
        self.space.index_of(occupation)
    }

    pub fn microstates(&self) -> Vec<Vec<usize>> {
        self.space
            .occupations()
            .outer_iter()
            .map(|occupation| occupation.to_vec())
            .collect()
    }

    pub fn total_electrons(&self) -> Vec<usize> {
        (0..self.space.len())
            .map(|state| self.space.total_electrons(state))
            .collect()
    }

    /// All population on one compressed state.
    pub fn point_population(&self, state: usize) -> Result<Array1<f64>> {
        if state >= self.space.len() {
            return Err(KineticsError::DimensionMismatch {
                expected: self.space.len(),
                found: state + 1,
            });
        }
        let mut population = Array1::zeros(self.space.len());
        population[state] = 1.;
        Ok(population)
    }

    /// States with zero total outgoing rate. These are absorbing, whether by
    /// design (masking, reservoirs only feeding in) or by a connectivity gap.
    pub fn zero_outflow_states(&self) -> Vec<usize> {
        self.matrix.absorbing_states()
    }

    /// Every nonzero off-diagonal entry `K[to][from]`.
    pub fn connected_states(&self) -> Vec<ConnectedPair> {
        let matrix: &Array2<f64> = self.matrix.as_array();
        let mut pairs = Vec::new();
        for ((to, from), &rate) in matrix.indexed_iter() {
            if to == from || rate == 0. {
                continue;
            }
            pairs.push(ConnectedPair {
                from,
                to,
                from_occupation: self.space.occupation(from).to_vec(),
                to_occupation: self.space.occupation(to).to_vec(),
                rate,
            });
        }
        pairs
    }

    pub(crate) fn check_population(&self, population: &Array1<f64>) -> Result<()> {
        if population.len() != self.space.len() {
            return Err(KineticsError::DimensionMismatch {
                expected: self.space.len(),
                found: population.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Network of {} cofactors", self.registry.num_cofactors())?;
        for (id, cofactor) in self.registry.cofactors().iter().enumerate() {
            write!(f, "[{}] {}", id, cofactor)?;
        }
        writeln!(f, "Distances (Å):")?;
        for row in self.distances.as_array().outer_iter() {
            let row: Vec<String> = row.iter().map(|d| format!("{:6.2}", d)).collect();
            writeln!(f, "  {}", row.join(" "))?;
        }
        for reservoir in self.registry.reservoirs() {
            writeln!(
                f,
                "Reservoir {} on cofactor {}: level {} -> {}, deltaG {:+.3} eV, rate {:e}/s",
                reservoir.name,
                reservoir.cofactor.0,
                reservoir.source_level,
                reservoir.target_level(),
                reservoir.delta_g,
                reservoir.rate
            )?;
        }
        let (min, max) = self.space.electron_bounds();
        writeln!(
            f,
            "{} of {} microstates hold {} to {} electrons",
            self.space.len(),
            self.space.num_raw_states(),
            min,
            max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::free_energy::free_energy;
    use crate::markov_chain::MarkovChain;
    use crate::parameters::COULOMB_CONSTANT;

    fn chain_of_three() -> NetworkBuilder {
        let mut builder = NetworkBuilder::new();
        let a = builder.add_cofactor("A", vec![-0.4]).unwrap();
        let b = builder.add_cofactor("B", vec![-0.2, -0.6]).unwrap();
        let c = builder.add_cofactor("C", vec![0.1]).unwrap();
        builder.add_connection(a, b, 8.).unwrap();
        builder.add_connection(b, c, 9.).unwrap();
        builder.add_distance(a, c, 17.).unwrap();
        builder
    }

    #[test]
    fn generator_invariants() {
        let network = chain_of_three().build().unwrap();
        let matrix = network.rate_matrix();
        let scale = matrix
            .as_array()
            .diag()
            .iter()
            .fold(0_f64, |max, rate| max.max(rate.abs()));
        for sum in matrix.column_sums().iter() {
            assert!(sum.abs() <= 1e-9 * scale);
        }
        for ((i, j), &rate) in matrix.as_array().indexed_iter() {
            if i != j {
                assert!(rate >= 0.);
            }
        }
    }

    #[test]
    fn detailed_balance_matches_free_energies() {
        let network = chain_of_three().build().unwrap();
        let beta = network.parameters().beta;
        let permittivity = network.parameters().relative_permittivity;
        let energy = |state: usize| {
            free_energy(
                network.state_space().occupation(state),
                network.registry().cofactors(),
                network.distances(),
                permittivity,
            )
        };
        let matrix = network.rate_matrix();
        let mut checked = 0;
        for i in 0..network.num_states() {
            for j in 0..network.num_states() {
                if i == j || matrix.rate(i, j) == 0. {
                    continue;
                }
                let ratio = matrix.rate(i, j) / matrix.rate(j, i);
                let expected = (-beta * (energy(j) - energy(i))).exp();
                assert!((ratio / expected - 1.).abs() < 1e-9);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn only_connected_pairs_transfer() {
        let network = chain_of_three().build().unwrap();
        for pair in network.connected_states() {
            let moved: Vec<usize> = (0..3)
                .filter(|&c| pair.from_occupation[c] != pair.to_occupation[c])
                .collect();
            assert_eq!(moved.len(), 2);
            assert!(network.distances().is_connected(moved[0], moved[1]));
            assert_eq!(
                pair.from_occupation.iter().sum::<usize>(),
                pair.to_occupation.iter().sum::<usize>()
            );
        }
    }

    #[test]
    fn coulomb_term_of_a_far_pair() {
        // A holds one electron and C holds one; they are 17 Å apart.
        let network = chain_of_three().build().unwrap();
        let initial = network.state_index(&[1, 0, 1]).unwrap();
        let alone = network.state_index(&[1, 0, 0]).unwrap();
        let coulomb = 2. * COULOMB_CONSTANT / network.parameters().relative_permittivity / 17.;
        let site = -0.1;
        let delta = network.free_energies()[initial] - network.free_energies()[alone];
        assert!((delta - (site + coulomb)).abs() < 1e-12);
    }

    #[test]
    fn co_occupied_pair_needs_a_distance() {
        let mut builder = NetworkBuilder::new();
        let a = builder.add_cofactor("A", vec![-0.4]).unwrap();
        let b = builder.add_cofactor("B", vec![-0.2]).unwrap();
        let c = builder.add_cofactor("C", vec![0.1]).unwrap();
        builder.add_connection(a, b, 8.).unwrap();
        builder.add_connection(b, c, 9.).unwrap();

        // A single electron never puts A and C together.
        builder.set_electron_bounds(1, 1);
        assert!(builder.build().is_ok());

        builder.set_electron_bounds(1, 2);
        assert!(matches!(
            builder.build(),
            Err(KineticsError::MissingDistance { first: 0, second: 2 })
        ));

        builder.add_distance(a, c, 17.).unwrap();
        assert!(builder.build().is_ok());
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let mut builder = chain_of_three();
        assert!(matches!(
            builder.add_connection(CofactorId(0), CofactorId(9), 5.),
            Err(KineticsError::UnknownCofactor(_))
        ));
        assert!(matches!(
            builder.add_reservoir("sink", CofactorId(9), 1, 1, 0., 1.),
            Err(KineticsError::UnknownCofactor(_))
        ));
    }

    #[test]
    fn empty_bounds_fail_at_build() {
        let mut builder = chain_of_three();
        builder.set_electron_bounds(5, 5);
        assert!(matches!(
            builder.build(),
            Err(KineticsError::EmptyStateSpace { .. })
        ));
    }

    #[test]
    fn multi_electron_transfer_needs_a_connection() {
        let mut builder = chain_of_three();
        let (a, b, c) = (CofactorId(0), CofactorId(1), CofactorId(2));
        builder.add_multi_electron_transfer(b, 2, a, 0, 1).unwrap();
        assert!(builder.build().is_ok());
        assert!(builder.add_multi_electron_transfer(b, 1, a, 0, 2).is_err());
        assert!(matches!(
            builder.add_multi_electron_transfer(a, 1, c, 0, 1),
            Err(KineticsError::NotConnected { donor: 0, acceptor: 2 })
        ));
    }

    #[test]
    fn masking_creates_absorbing_state() {
        let mut builder = chain_of_three();
        builder.set_electron_bounds(1, 1);
        let network = builder.build().unwrap();
        assert!(network.zero_outflow_states().is_empty());
        let target = network.state_index(&[0, 0, 1]).unwrap();
        let masked = network
            .masked(&[TransitionMask::outflow(target, network.num_states())])
            .unwrap();
        assert_eq!(masked.zero_outflow_states(), vec![target]);
        assert!(network.zero_outflow_states().is_empty());
    }

    #[test]
    fn introspection() {
        let mut builder = chain_of_three();
        builder.set_electron_bounds(2, 2);
        let network = builder.build().unwrap();
        assert!(network.total_electrons().iter().all(|&n| n == 2));
        assert_eq!(network.microstates().len(), network.num_states());
        let description = network.to_string();
        assert!(description.contains("Network of 3 cofactors"));
        assert!(network.point_population(network.num_states()).is_err());
    }
}
