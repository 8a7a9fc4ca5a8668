use crate::error::{KineticsError, Result};
use crate::markov_chain::MarkovChain;
use crate::parameters::MarcusParameters;
use crate::rate_law::{backward_rate, marcus_rate};
use crate::state_space::StateSpace;
use crate::transition::Transition;
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::{debug, warn};

/// Column sums may drift this far (relative to the largest exit rate) before
/// the repair pass is reported.
pub const COLUMN_SUM_TOLERANCE: f64 = 1e-9;

/// A forward/backward rate pair between two compressed states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub initial: usize,
    pub last: usize,
    pub forward: f64,
    pub backward: f64,
}

/// Zeroes the jumps from any state in `sources` to any state in `targets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionMask {
    pub sources: Range<usize>,
    pub targets: Range<usize>,
}

impl TransitionMask {
    pub fn new(sources: Range<usize>, targets: Range<usize>) -> Self {
        TransitionMask { sources, targets }
    }

    /// Makes `state` absorbing.
    pub fn outflow(state: usize, num_states: usize) -> Self {
        TransitionMask {
            sources: state..state + 1,
            targets: 0..num_states,
        }
    }
}

/// Accumulates rate contributions. Only [`RateMatrixBuilder::finish`] hands
/// out a usable generator.
#[derive(Debug, Clone)]
pub struct RateMatrixBuilder {
    matrix: Array2<f64>,
}

impl RateMatrixBuilder {
    pub fn new(num_states: usize) -> Self {
        RateMatrixBuilder {
            matrix: Array2::zeros((num_states, num_states)),
        }
    }

    pub fn add(&mut self, contribution: Contribution) {
        let Contribution {
            initial: i,
            last: j,
            forward,
            backward,
        } = contribution;
        self.matrix[[j, i]] += forward;
        self.matrix[[i, i]] -= forward;
        self.matrix[[i, j]] += backward;
        self.matrix[[j, j]] -= backward;
    }

    pub fn finish(self) -> RateMatrix {
        let drift = column_sum_drift(&self.matrix);
        if drift > COLUMN_SUM_TOLERANCE {
            warn!("generator column sums drifted by {:e} before repair", drift);
        } else {
            debug!("generator column sums drifted by {:e} before repair", drift);
        }
        RateMatrix::from_dense(self.matrix)
    }
}

/// The generator `K` of the chain: `K[j][i]` is the rate from `i` to `j` and
/// each diagonal entry is minus the rest of its column.
#[derive(Debug, Clone)]
pub struct RateMatrix {
    matrix: Array2<f64>,
    outgoing: Vec<Outgoing>,
}

/// Jumps out of one state, with running sums of their rates.
#[derive(Debug, Clone, Default)]
struct Outgoing {
    targets: Vec<usize>,
    partial_sums: Vec<f64>,
}

/*
 * Constructors
 */
impl RateMatrix {
    /// Takes the off-diagonal part of `matrix` as given and re-derives the
    /// diagonal so every column sums to zero.
    pub fn from_dense(mut matrix: Array2<f64>) -> Self {
        let n = matrix.nrows();
        let mut outgoing = Vec::with_capacity(n);
        for i in 0..n {
            let mut jumps = Outgoing::default();
            let mut sum = 0.;
            for j in 0..n {
                if i == j {
                    continue;
                }
                let rate = matrix[[j, i]];
                if rate > 0. {
                    sum += rate;
                    jumps.targets.push(j);
                    jumps.partial_sums.push(sum);
                }
            }
            matrix[[i, i]] = -sum;
            outgoing.push(jumps);
        }
        RateMatrix { matrix, outgoing }
    }

    /// Returns a copy with the masked jumps removed.
    pub fn masked(&self, masks: &[TransitionMask]) -> Result<RateMatrix> {
        let n = self.matrix.nrows();
        let mut matrix = self.matrix.clone();
        for mask in masks {
            if mask.sources.end > n || mask.targets.end > n {
                return Err(KineticsError::InvalidParameter(format!(
                    "mask {:?} -> {:?} exceeds {} states",
                    mask.sources, mask.targets, n
                )));
            }
            for source in mask.sources.clone() {
                for target in mask.targets.clone() {
                    if source != target {
                        matrix[[target, source]] = 0.;
                    }
                }
            }
        }
        Ok(RateMatrix::from_dense(matrix))
    }
}

/*
 * Access to data
 */
impl RateMatrix {
    pub fn as_array(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    /// States with no way out.
    pub fn absorbing_states(&self) -> Vec<usize> {
        self.outgoing
            .iter()
            .enumerate()
            .filter(|(_, jumps)| jumps.targets.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn column_sums(&self) -> Array1<f64> {
        self.matrix.sum_axis(ndarray::Axis(0))
    }
}

impl MarkovChain for RateMatrix {
    fn num_states(&self) -> usize {
        self.matrix.nrows()
    }

    fn rate(&self, from: usize, to: usize) -> f64 {
        self.matrix[[to, from]]
    }

    fn exit_rate(&self, from: usize) -> f64 {
        self.outgoing[from].partial_sums.last().copied().unwrap_or(0.)
    }

    fn jump(&self, from: usize, u: f64) -> usize {
        let jumps = &self.outgoing[from];
        let chosen = jumps.partial_sums.partition_point(|sum| *sum <= u);
        let last = jumps.targets.len().saturating_sub(1);
        jumps.targets.get(chosen.min(last)).copied().unwrap_or(from)
    }
}

/// Largest column sum relative to the largest exit rate.
pub fn column_sum_drift(matrix: &Array2<f64>) -> f64 {
    let scale = matrix
        .diag()
        .iter()
        .fold(0_f64, |max, rate| max.max(rate.abs()));
    if scale == 0. {
        return 0.;
    }
    matrix
        .sum_axis(ndarray::Axis(0))
        .iter()
        .fold(0_f64, |max, sum| max.max(sum.abs()))
        / scale
}

/// Rate pairs contributed by one transition.
pub fn contributions(
    transition: &Transition,
    space: &StateSpace,
    energies: &Array1<f64>,
    parameters: &MarcusParameters,
) -> Result<Vec<Contribution>> {
    let pairs = transition.state_pairs(space);
    let mut contributions = Vec::with_capacity(pairs.len());
    for (initial, last) in pairs {
        let (forward, delta_g) = match *transition {
            Transition::ElectronTransfer { distance, .. } => {
                let delta_g = energies[last] - energies[initial];
                (marcus_rate(delta_g, distance, parameters)?, delta_g)
            }
            Transition::Reservoir { delta_g, rate, .. } => (rate, delta_g),
        };
        let backward = backward_rate(forward, delta_g, parameters.beta)?;
        contributions.push(Contribution {
            initial,
            last,
            forward,
            backward,
        });
    }
    Ok(contributions)
}

/// Builds the generator from every transition.
///
/// Transitions are evaluated in parallel, each into its own list, and the
/// lists are then summed into the matrix in transition order, so the result
/// does not depend on the thread count.
pub fn assemble(
    space: &StateSpace,
    transitions: &[Transition],
    energies: &Array1<f64>,
    parameters: &MarcusParameters,
) -> Result<RateMatrix> {
    let per_transition: Vec<Vec<Contribution>> = transitions
        .par_iter()
        .map(|transition| contributions(transition, space, energies, parameters))
        .collect::<Result<_>>()?;

    let mut builder = RateMatrixBuilder::new(space.len());
    let mut count = 0;
    for contributions in per_transition {
        count += contributions.len();
        for contribution in contributions {
            builder.add(contribution);
        }
    }
    debug!(
        "assembled {} state pairs from {} transitions over {} states",
        count,
        transitions.len(),
        space.len()
    );
    Ok(builder.finish())
}
