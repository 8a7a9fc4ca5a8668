use crate::error::{KineticsError, Result};
use crate::network::Network;
use crate::rate_law::backward_rate;
use crate::registry::CofactorId;
use crate::transition::Transition;
use ndarray::Array1;

/*
 * Observables of a population vector
 */
impl Network {
    /// Probability that `cofactor` holds exactly `level` electrons.
    pub fn population(&self, population: &Array1<f64>, cofactor: CofactorId, level: usize) -> Result<f64> {
        self.check_population(population)?;
        self.registry().check_level(cofactor, level)?;
        Ok(self
            .state_space()
            .states_with(cofactor.0, level)
            .iter()
            .map(|&state| population[state])
            .sum())
    }

    /// Mean number of electrons on `cofactor`.
    pub fn expectation_value(&self, population: &Array1<f64>, cofactor: CofactorId) -> Result<f64> {
        self.check_population(population)?;
        self.registry().cofactor(cofactor)?;
        let occupations = self.state_space().occupations();
        Ok(population
            .iter()
            .enumerate()
            .map(|(state, p)| occupations[[state, cofactor.0]] as f64 * p)
            .sum())
    }

    /// Probability that `first` holds `first_level` and `second` holds
    /// `second_level` at the same time.
    pub fn joint_probability(
        &self,
        population: &Array1<f64>,
        first: CofactorId,
        first_level: usize,
        second: CofactorId,
        second_level: usize,
    ) -> Result<f64> {
        self.check_population(population)?;
        self.registry().check_level(first, first_level)?;
        self.registry().check_level(second, second_level)?;
        Ok(self
            .state_space()
            .states_with_both((first.0, first_level), (second.0, second_level))
            .iter()
            .map(|&state| population[state])
            .sum())
    }

    /// Instantaneous rate of single electrons hopping from `donor`, leaving
    /// `donor_level`, to `acceptor`, arriving at `acceptor_level`.
    ///
    /// Zero when either level is 0, since no such hop exists.
    pub fn directional_rate(
        &self,
        donor: CofactorId,
        donor_level: usize,
        acceptor: CofactorId,
        acceptor_level: usize,
        population: &Array1<f64>,
    ) -> Result<f64> {
        self.check_population(population)?;
        self.registry().check_level(donor, donor_level)?;
        self.registry().check_level(acceptor, acceptor_level)?;
        if donor == acceptor {
            return Err(KineticsError::InvalidParameter(format!(
                "cofactor {} cannot transfer to itself",
                donor.0
            )));
        }
        if donor_level == 0 || acceptor_level == 0 {
            return Ok(0.);
        }

        // Only used for matching states, so the distance is irrelevant.
        let hop = Transition::single_electron(donor, donor_level, acceptor, acceptor_level - 1, 0.);
        let matrix = self.rate_matrix().as_array();
        Ok(hop
            .state_pairs(self.state_space())
            .into_iter()
            .map(|(initial, last)| matrix[[last, initial]] * population[initial])
            .sum())
    }

    /// Forward minus backward [`Network::directional_rate`].
    pub fn net_flux(
        &self,
        donor: CofactorId,
        donor_level: usize,
        acceptor: CofactorId,
        acceptor_level: usize,
        population: &Array1<f64>,
    ) -> Result<f64> {
        let forward = self.directional_rate(donor, donor_level, acceptor, acceptor_level, population)?;
        let backward = self.directional_rate(acceptor, acceptor_level, donor, donor_level, population)?;
        Ok(forward - backward)
    }

    /// Net rate of electrons flowing into the named reservoir.
    pub fn reservoir_flux(&self, name: &str, population: &Array1<f64>) -> Result<f64> {
        let reservoir = self.registry().reservoir(self.reservoir_id(name)?)?;
        let reverse = backward_rate(reservoir.rate, reservoir.delta_g, self.parameters().beta)?;
        let full = self.population(population, reservoir.cofactor, reservoir.source_level)?;
        let drained = self.population(population, reservoir.cofactor, reservoir.target_level())?;
        Ok((full * reservoir.rate - drained * reverse) * reservoir.electrons as f64)
    }
}

/*
 * Observables over time
 */
impl Network {
    pub fn population_time_course(
        &self,
        times: &[f64],
        initial: &Array1<f64>,
        cofactor: CofactorId,
        level: usize,
    ) -> Result<Vec<f64>> {
        self.registry().check_level(cofactor, level)?;
        let course = self.time_course(times, initial)?;
        course
            .outer_iter()
            .map(|row| self.population(&row.to_owned(), cofactor, level))
            .collect()
    }

    pub fn reservoir_flux_time_course(&self, name: &str, times: &[f64], initial: &Array1<f64>) -> Result<Vec<f64>> {
        self.reservoir_id(name)?;
        let course = self.time_course(times, initial)?;
        course
            .outer_iter()
            .map(|row| self.reservoir_flux(name, &row.to_owned()))
            .collect()
    }

    /// Each microstate with its population at time `t`.
    pub fn population_by_state(&self, t: f64, initial: &Array1<f64>) -> Result<Vec<(f64, Vec<usize>)>> {
        let population = self.evolve(t, initial)?;
        Ok(population.iter().copied().zip(self.microstates()).collect())
    }
}

/// Time spent in each state up to `final_time`, replaying a jump log of
/// `(holding time, new state)` pairs from `initial_state`.
pub fn dwell_times(initial_state: usize, jumps: &[(f64, usize)], final_time: f64, num_states: usize) -> Array1<f64> {
    let mut dwell = Array1::zeros(num_states);
    let mut state = initial_state;
    let mut t = 0.;
    for &(dt, next) in jumps {
        if t + dt > final_time {
            break;
        }
        dwell[state] += dt;
        t += dt;
        state = next;
    }
    if final_time > t {
        dwell[state] += final_time - t;
    }
    dwell
}
