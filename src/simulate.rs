use crate::error::{KineticsError, Result};
use crate::markov_chain::MarkovChain;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Limits on a single sample path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Jumps allowed before the last checkpoint is reached.
    pub max_events: usize,
    /// Keep every jump as `(holding time, new state)`.
    pub record_jumps: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            max_events: 10_000_000,
            record_jumps: false,
        }
    }
}

/// One sample path observed at a list of checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub initial_state: usize,
    pub checkpoints: Vec<f64>,
    /// State held at each checkpoint.
    pub states: Vec<usize>,
    /// Empty unless jumps were recorded.
    pub jumps: Vec<(f64, usize)>,
}

/// Samples one path of `chain` from `initial`.
///
/// The state recorded for a checkpoint is the one entered at the last jump at
/// or before it. An absorbing state is held for every remaining checkpoint.
pub fn simulate<C: MarkovChain + ?Sized>(
    chain: &C,
    initial: usize,
    checkpoints: &[f64],
    config: &SimulationConfig,
    rng: &mut impl Rng,
) -> Result<Trajectory> {
    if initial >= chain.num_states() {
        return Err(KineticsError::DimensionMismatch {
            expected: chain.num_states(),
            found: initial + 1,
        });
    }
    check_checkpoints(checkpoints)?;

    let mut state = initial;
    let mut t = 0.;
    let mut states = Vec::with_capacity(checkpoints.len());
    let mut jumps = Vec::new();
    let mut events = 0;
    loop {
        let total_rate = chain.exit_rate(state);
        if total_rate == 0. {
            states.resize(checkpoints.len(), state);
            break;
        }
        let dt = -(1. - rng.random::<f64>()).ln() / total_rate;
        let next_time = t + dt;
        while states.len() < checkpoints.len() && checkpoints[states.len()] < next_time {
            states.push(state);
        }
        if states.len() == checkpoints.len() {
            break;
        }
        if events == config.max_events {
            return Err(KineticsError::EventLimitExceeded {
                limit: config.max_events,
            });
        }

        state = chain.jump(state, rng.random::<f64>() * total_rate);
        t = next_time;
        events += 1;
        if config.record_jumps {
            jumps.push((dt, state));
        }
    }

    Ok(Trajectory {
        initial_state: initial,
        checkpoints: checkpoints.to_vec(),
        states,
        jumps,
    })
}

fn check_checkpoints(checkpoints: &[f64]) -> Result<()> {
    let mut previous = 0.;
    for &checkpoint in checkpoints {
        if !checkpoint.is_finite() || checkpoint < previous {
            return Err(KineticsError::InvalidParameter(format!(
                "checkpoints must be finite, non-negative and sorted, got {:?}",
                checkpoints
            )));
        }
        previous = checkpoint;
    }
    Ok(())
}

/// Draws a state with probability proportional to `population`.
pub fn sample_state(population: &Array1<f64>, rng: &mut impl Rng) -> Result<usize> {
    if population.iter().any(|p| !p.is_finite() || *p < 0.) {
        return Err(KineticsError::InvalidPopulation(
            "entries must be finite and non-negative".to_string(),
        ));
    }
    let total = population.sum();
    if total <= 0. {
        return Err(KineticsError::InvalidPopulation(
            "population sums to zero".to_string(),
        ));
    }
    let u = rng.random::<f64>() * total;
    let mut sum = 0.;
    let mut last_occupied = 0;
    for (state, &p) in population.iter().enumerate() {
        if p == 0. {
            continue;
        }
        sum += p;
        last_occupied = state;
        if u < sum {
            return Ok(state);
        }
    }
    Ok(last_occupied)
}

/// Fraction of `n_trials` independent paths in each state at each checkpoint,
/// one row per checkpoint.
///
/// Trial `i` draws its initial state from `population` and runs on its own
/// generator seeded with `seed + i`, so results do not depend on the thread
/// count.
pub fn ensemble<C: MarkovChain + Sync + ?Sized>(
    chain: &C,
    population: &Array1<f64>,
    checkpoints: &[f64],
    n_trials: usize,
    seed: u64,
    config: &SimulationConfig,
) -> Result<Array2<f64>> {
    if population.len() != chain.num_states() {
        return Err(KineticsError::DimensionMismatch {
            expected: chain.num_states(),
            found: population.len(),
        });
    }
    if n_trials == 0 {
        return Err(KineticsError::InvalidParameter(
            "ensemble needs at least one trial".to_string(),
        ));
    }
    info!(
        "sampling {} trajectories over {} states at {} checkpoints",
        n_trials,
        chain.num_states(),
        checkpoints.len()
    );

    let trajectories: Vec<Vec<usize>> = (0..n_trials)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            let initial = sample_state(population, &mut rng)?;
            simulate(chain, initial, checkpoints, config, &mut rng).map(|path| path.states)
        })
        .collect::<Result<_>>()?;

    let mut histogram = Array2::zeros((checkpoints.len(), chain.num_states()));
    for states in trajectories.iter() {
        for (checkpoint, &state) in states.iter().enumerate() {
            histogram[[checkpoint, state]] += 1.;
        }
    }
    histogram /= n_trials as f64;
    debug!("ensemble of {} trajectories done", n_trials);
    Ok(histogram)
}
