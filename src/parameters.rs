use crate::error::{KineticsError, Result};
use serde::{Deserialize, Serialize};

/// Coulomb constant in eV·Å.
pub const COULOMB_CONSTANT: f64 = 14.39;

/// Physical parameters shared by every transfer in a network.
///
/// Energies are in eV, distances in Å and rates come out in 1/s. The
/// defaults describe a protein interior at room temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarcusParameters {
    /// Reduced Planck constant, eV·s.
    pub hbar: f64,
    /// Inverse thermal energy 1/kT, 1/eV.
    pub beta: f64,
    pub reorganization_energy: f64,
    /// Electronic coupling at contact, eV.
    pub coupling: f64,
    /// Exponential decay of the coupling with distance, 1/Å.
    pub decay: f64,
    pub relative_permittivity: f64,
    /// Energy of the accepting vibrational mode, eV.
    pub vibrational_energy: f64,
    /// Highest vibrational quantum included in the Franck-Condon sum.
    pub quanta: usize,
    pub huang_rhys: f64,
}

impl Default for MarcusParameters {
    fn default() -> Self {
        MarcusParameters {
            hbar: 6.5821e-16,
            beta: 39.06,
            reorganization_energy: 0.7,
            coupling: 0.01,
            decay: 0.6,
            relative_permittivity: 8.,
            vibrational_energy: 0.15,
            quanta: 100,
            huang_rhys: 0.5,
        }
    }
}

impl MarcusParameters {
    /// Reads parameters from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let parameters: MarcusParameters = serde_json::from_str(json)?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn with_reorganization_energy(mut self, reorganization_energy: f64) -> Self {
        self.reorganization_energy = reorganization_energy;
        self
    }

    pub fn with_coupling(mut self, coupling: f64) -> Self {
        self.coupling = coupling;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("hbar", self.hbar),
            ("beta", self.beta),
            ("reorganization_energy", self.reorganization_energy),
            ("relative_permittivity", self.relative_permittivity),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.) {
                return Err(KineticsError::InvalidParameter(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        let non_negative = [
            ("coupling", self.coupling),
            ("decay", self.decay),
            ("vibrational_energy", self.vibrational_energy),
            ("huang_rhys", self.huang_rhys),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.) {
                return Err(KineticsError::InvalidParameter(format!(
                    "{} must be non-negative and finite, got {}",
                    name, value
                )));
            }
        }
        // The Poisson weights peak near n = D; the sum has to run well past it.
        if (self.quanta as f64) < self.huang_rhys + 10. * self.huang_rhys.sqrt() + 10. {
            return Err(KineticsError::InvalidParameter(format!(
                "{} vibrational quanta cannot resolve a Huang-Rhys factor of {}",
                self.quanta, self.huang_rhys
            )));
        }
        Ok(())
    }
}
