use crate::error::{KineticsError, Result};
use crate::parameters::MarcusParameters;
use std::f64::consts::PI;

/// Nonadiabatic electron-transfer rate (1/s) from Marcus theory with one
/// accepting vibrational mode.
///
/// Each vibrational channel `n` contributes a Gaussian in
/// `delta_g + n·ħω + λ` weighted by the Poisson (Franck-Condon) factor
/// `exp(-D)·Dⁿ/n!`. The weights are built by the ratio update
/// `w_n = w_{n-1}·D/n` so no factorial is ever formed. Past `n = 2D` each
/// weight at least halves, so the sum stops once the tail drops below machine
/// precision.
pub fn marcus_rate(delta_g: f64, distance: f64, parameters: &MarcusParameters) -> Result<f64> {
    if !delta_g.is_finite() {
        return Err(KineticsError::InvalidParameter(format!(
            "free energy change must be finite, got {}",
            delta_g
        )));
    }
    if !(distance.is_finite() && distance > 0.) {
        return Err(KineticsError::InvalidParameter(format!(
            "transfer distance must be positive, got {}",
            distance
        )));
    }

    let MarcusParameters {
        hbar,
        beta,
        reorganization_energy: lambda,
        coupling,
        decay,
        vibrational_energy,
        quanta,
        huang_rhys,
        ..
    } = *parameters;

    if coupling == 0. {
        return Ok(0.);
    }

    let effective_coupling = coupling * (-decay * distance).exp();
    let prefactor = 2. * PI / hbar * effective_coupling * effective_coupling
        / (4. * PI * lambda / beta).sqrt();

    let mut weight = (-huang_rhys).exp();
    let mut rate = 0.;
    for n in 0..=quanta {
        if n > 0 {
            weight *= huang_rhys / n as f64;
        }
        let offset = delta_g + n as f64 * vibrational_energy + lambda;
        rate += weight * (-beta * offset * offset / (4. * lambda)).exp();

        let past_peak = n as f64 >= 2. * huang_rhys && (offset >= 0. || vibrational_energy == 0.);
        if past_peak && rate > 0. && 2. * weight < f64::EPSILON * rate {
            break;
        }
    }
    let rate = prefactor * rate;

    if !rate.is_finite() {
        return Err(KineticsError::RateOutOfRange {
            rate,
            delta_g,
            reason: "overflow",
        });
    }
    if rate == 0. {
        return Err(KineticsError::RateOutOfRange {
            rate,
            delta_g,
            reason: "underflow",
        });
    }
    Ok(rate)
}

/// Reverse rate implied by detailed balance: `k_b = k_f·exp(β·ΔG)`.
pub fn backward_rate(forward: f64, delta_g: f64, beta: f64) -> Result<f64> {
    let backward = forward * (beta * delta_g).exp();
    if !backward.is_finite() {
        return Err(KineticsError::RateOutOfRange {
            rate: backward,
            delta_g,
            reason: "overflow in detailed balance",
        });
    }
    if forward > 0. && backward == 0. {
        return Err(KineticsError::RateOutOfRange {
            rate: backward,
            delta_g,
            reason: "underflow in detailed balance",
        });
    }
    Ok(backward)
}

/// Cofactor-to-reservoir rate for a reservoir whose reverse rate is `kb`.
pub fn reservoir_rate(kb: f64, delta_g: f64, beta: f64) -> f64 {
    kb * (-beta * delta_g).exp()
}
