use crate::error::{KineticsError, Result};
use crate::network::Network;
use crate::rate_matrix::{column_sum_drift, COLUMN_SUM_TOLERANCE};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use tracing::debug;

const PADE_3: [f64; 4] = [120., 60., 12., 1.];
const PADE_5: [f64; 6] = [30240., 15120., 3360., 420., 30., 1.];
const PADE_7: [f64; 8] = [17297280., 8648640., 1995840., 277200., 25200., 1512., 56., 1.];
const PADE_9: [f64; 10] = [
    17643225600.,
    8821612800.,
    2075673600.,
    302702400.,
    30270240.,
    2162160.,
    110880.,
    3960.,
    90.,
    1.,
];
const PADE_13: [f64; 14] = [
    64764752532480000.,
    32382376266240000.,
    7771770303897600.,
    1187353796428800.,
    129060195264000.,
    10559470521600.,
    670442572800.,
    33522128640.,
    1323241920.,
    40840800.,
    960960.,
    16380.,
    182.,
    1.,
];

/// Largest 1-norm for which each low-order approximant is accurate to double
/// precision, paired with its coefficients.
const LOW_ORDERS: [(f64, &[f64]); 4] = [
    (1.495585217958292e-2, &PADE_3),
    (2.539398330063230e-1, &PADE_5),
    (9.504178996162932e-1, &PADE_7),
    (2.097847961257068, &PADE_9),
];
const THETA_13: f64 = 5.371920351148152;

/// A propagator column may sum this far from one before it is rejected.
const PROPAGATOR_DRIFT_TOLERANCE: f64 = 1e-6;

/// Matrix exponential by Padé approximation with scaling and squaring.
pub fn expm(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    exponential(matrix, false)
}

/// Transition matrix `exp(K·t)` of the generator `K`.
///
/// Uses the same approximant as [`expm`], but after the Padé solve and after
/// every squaring each column is clamped to non-negative entries and rescaled
/// to sum to one.
pub fn transition_matrix(generator: &Array2<f64>, t: f64) -> Result<Array2<f64>> {
    if !t.is_finite() || t < 0. {
        return Err(KineticsError::InvalidParameter(format!(
            "propagation time must be finite and non-negative, got {}",
            t
        )));
    }
    if generator.ncols() != generator.nrows() {
        return Err(KineticsError::DimensionMismatch {
            expected: generator.nrows(),
            found: generator.ncols(),
        });
    }
    let negative = generator
        .indexed_iter()
        .any(|((i, j), &rate)| i != j && (rate < 0. || !rate.is_finite()));
    if negative {
        return Err(KineticsError::InvalidParameter(
            "generator has a negative or non-finite off-diagonal rate".to_string(),
        ));
    }
    let drift = column_sum_drift(generator);
    if drift > COLUMN_SUM_TOLERANCE {
        return Err(KineticsError::InvalidParameter(format!(
            "generator columns do not sum to zero (drift {:e})",
            drift
        )));
    }
    exponential(&(generator * t), true)
}

fn exponential(matrix: &Array2<f64>, stochastic: bool) -> Result<Array2<f64>> {
    let n = matrix.nrows();
    if matrix.ncols() != n {
        return Err(KineticsError::DimensionMismatch {
            expected: n,
            found: matrix.ncols(),
        });
    }
    if matrix.iter().any(|x| !x.is_finite()) {
        return Err(KineticsError::PropagationFailed(
            "matrix has non-finite entries".to_string(),
        ));
    }

    let norm = one_norm(matrix);
    let identity = Array2::<f64>::eye(n);
    for (theta, coefficients) in LOW_ORDERS {
        if norm <= theta {
            let (u, v) = low_order_terms(matrix, &identity, coefficients);
            let mut result = pade_quotient(&u, &v)?;
            if stochastic {
                renormalize_columns(&mut result)?;
            }
            return Ok(result);
        }
    }

    let squarings = if norm > THETA_13 {
        (norm / THETA_13).log2().ceil() as i32
    } else {
        0
    };
    let scaled = matrix / 2_f64.powi(squarings);
    let b = &PADE_13;
    let a2 = scaled.dot(&scaled);
    let a4 = a2.dot(&a2);
    let a6 = a4.dot(&a2);
    let inner_u = &a6 * b[13] + &a4 * b[11] + &a2 * b[9];
    let u = scaled.dot(&(a6.dot(&inner_u) + &a6 * b[7] + &a4 * b[5] + &a2 * b[3] + &identity * b[1]));
    let inner_v = &a6 * b[12] + &a4 * b[10] + &a2 * b[8];
    let v = a6.dot(&inner_v) + &a6 * b[6] + &a4 * b[4] + &a2 * b[2] + &identity * b[0];

    let mut result = pade_quotient(&u, &v)?;
    if stochastic {
        renormalize_columns(&mut result)?;
    }
    for _ in 0..squarings {
        result = result.dot(&result);
        if stochastic {
            renormalize_columns(&mut result)?;
        }
    }
    debug!("expm: norm {:e}, {} squarings", norm, squarings);
    if result.iter().any(|x| !x.is_finite()) {
        return Err(KineticsError::PropagationFailed(format!(
            "exponential overflowed after {} squarings",
            squarings
        )));
    }
    Ok(result)
}

fn one_norm(matrix: &Array2<f64>) -> f64 {
    matrix
        .mapv(f64::abs)
        .sum_axis(Axis(0))
        .iter()
        .fold(0_f64, |max, x| max.max(*x))
}

/// Clamps rounding negatives to zero and rescales every column to sum to one.
fn renormalize_columns(matrix: &mut Array2<f64>) -> Result<()> {
    for mut column in matrix.columns_mut() {
        let sum = column.sum();
        if !sum.is_finite() || (sum - 1.).abs() > PROPAGATOR_DRIFT_TOLERANCE {
            return Err(KineticsError::PropagationFailed(format!(
                "propagator column sums to {}",
                sum
            )));
        }
        column.mapv_inplace(|p| if p < 0. { 0. } else { p });
        let clamped = column.sum();
        column /= clamped;
    }
    Ok(())
}

/// Odd part `U` and even part `V` of a degree `m` approximant.
fn low_order_terms(matrix: &Array2<f64>, identity: &Array2<f64>, b: &[f64]) -> (Array2<f64>, Array2<f64>) {
    let a2 = matrix.dot(matrix);
    let mut power = identity.clone();
    let mut odd = identity * b[1];
    let mut v = identity * b[0];
    for k in 1..b.len() / 2 {
        power = power.dot(&a2);
        odd = odd + &power * b[2 * k + 1];
        v = v + &power * b[2 * k];
    }
    (matrix.dot(&odd), v)
}

/// Solves `(V - U) R = V + U`.
fn pade_quotient(u: &Array2<f64>, v: &Array2<f64>) -> Result<Array2<f64>> {
    solve(v - u, v + u)
}

/// Gaussian elimination with partial pivoting, solving `A X = B` in place.
fn solve(mut a: Array2<f64>, mut b: Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[[row, col]].abs() > a[[pivot, col]].abs() {
                pivot = row;
            }
        }
        let pivot_value = a[[pivot, col]];
        if pivot_value == 0. || !pivot_value.is_finite() {
            return Err(KineticsError::PropagationFailed(
                "Padé denominator is singular".to_string(),
            ));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            for k in 0..b.ncols() {
                b.swap([pivot, k], [col, k]);
            }
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / pivot_value;
            if factor == 0. {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            for k in 0..b.ncols() {
                b[[row, k]] -= factor * b[[col, k]];
            }
        }
    }
    for col in (0..n).rev() {
        for k in 0..b.ncols() {
            let mut x = b[[col, k]];
            for j in col + 1..n {
                x -= a[[col, j]] * b[[j, k]];
            }
            b[[col, k]] = x / a[[col, col]];
        }
    }
    Ok(b)
}

impl Network {
    /// Population after time `t`: `exp(K·t)·population`.
    pub fn evolve(&self, t: f64, population: &Array1<f64>) -> Result<Array1<f64>> {
        self.check_population(population)?;
        if t == 0. {
            return Ok(population.clone());
        }
        let propagator = transition_matrix(self.rate_matrix().as_array(), t)?;
        Ok(propagator.dot(population))
    }

    /// Populations at each of `times`, one row per time.
    pub fn time_course(&self, times: &[f64], population: &Array1<f64>) -> Result<Array2<f64>> {
        let rows: Vec<Array1<f64>> = times
            .par_iter()
            .map(|&t| self.evolve(t, population))
            .collect::<Result<_>>()?;
        let mut course = Array2::zeros((times.len(), self.num_states()));
        for (mut row, populations) in course.outer_iter_mut().zip(rows) {
            row.assign(&populations);
        }
        Ok(course)
    }
}
