use crate::error::{KineticsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to a cofactor, issued by [`Registry::add_cofactor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CofactorId(pub usize);

/// Handle to a reservoir, issued by [`Registry::add_reservoir`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReservoirId(pub usize);

/// A redox-active site.
///
/// `redox[i]` is the reduction potential (eV) for taking the site from `i` to
/// `i + 1` electrons, so the capacity is the length of the ladder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cofactor {
    pub name: String,
    pub redox: Vec<f64>,
}

impl Cofactor {
    pub fn capacity(&self) -> usize {
        self.redox.len()
    }

    /// Potential paired with an occupancy of `level` electrons.
    pub fn potential(&self, level: usize) -> Option<f64> {
        level.checked_sub(1).and_then(|i| self.redox.get(i).copied())
    }
}

/// An external electron source or sink attached to one cofactor.
///
/// The forward process takes the cofactor from `source_level` to
/// `source_level - electrons` at `rate`; the reverse rate follows from
/// `delta_g` by detailed balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservoir {
    pub name: String,
    pub cofactor: CofactorId,
    pub source_level: usize,
    pub electrons: usize,
    pub delta_g: f64,
    pub rate: f64,
}

impl Reservoir {
    pub fn target_level(&self) -> usize {
        self.source_level - self.electrons
    }
}

/// Owns every cofactor and reservoir of a network.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    cofactors: Vec<Cofactor>,
    reservoirs: Vec<Reservoir>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn add_cofactor(&mut self, name: &str, redox: Vec<f64>) -> Result<CofactorId> {
        if redox.is_empty() {
            return Err(KineticsError::InvalidParameter(format!(
                "cofactor {} needs at least one redox potential",
                name
            )));
        }
        if let Some(potential) = redox.iter().find(|potential| !potential.is_finite()) {
            return Err(KineticsError::InvalidParameter(format!(
                "cofactor {} has a non-finite redox potential {}",
                name, potential
            )));
        }
        self.cofactors.push(Cofactor {
            name: name.to_string(),
            redox,
        });
        Ok(CofactorId(self.cofactors.len() - 1))
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
        let capacity = self.cofactor(cofactor)?.capacity();
        if self.reservoir_by_name(name).is_some() {
            return Err(KineticsError::DuplicateReservoir(name.to_string()));
        }
        if electrons == 0 {
            return Err(KineticsError::InvalidParameter(format!(
                "reservoir {} must exchange at least one electron",
                name
            )));
        }
        if source_level > capacity || source_level < electrons {
            return Err(KineticsError::InvalidLevel {
                cofactor: cofactor.0,
                level: source_level,
                capacity,
            });
        }
        if !delta_g.is_finite() || !(rate.is_finite() && rate >= 0.) {
            return Err(KineticsError::InvalidParameter(format!(
                "reservoir {} has deltaG {} and rate {}",
                name, delta_g, rate
            )));
        }
        self.reservoirs.push(Reservoir {
            name: name.to_string(),
            cofactor,
            source_level,
            electrons,
            delta_g,
            rate,
        });
        Ok(ReservoirId(self.reservoirs.len() - 1))
    }

    pub fn cofactor(&self, id: CofactorId) -> Result<&Cofactor> {
        self.cofactors
            .get(id.0)
            .ok_or_else(|| KineticsError::UnknownCofactor(format!("id {}", id.0)))
    }

    pub fn cofactor_id(&self, name: &str) -> Result<CofactorId> {
        self.cofactors
            .iter()
            .position(|cofactor| cofactor.name == name)
            .map(CofactorId)
            .ok_or_else(|| KineticsError::UnknownCofactor(name.to_string()))
    }

    pub fn reservoir(&self, id: ReservoirId) -> Result<&Reservoir> {
        self.reservoirs
            .get(id.0)
            .ok_or_else(|| KineticsError::UnknownReservoir(format!("id {}", id.0)))
    }

    pub fn reservoir_id(&self, name: &str) -> Result<ReservoirId> {
        self.reservoir_by_name(name)
            .ok_or_else(|| KineticsError::UnknownReservoir(name.to_string()))
    }

    fn reservoir_by_name(&self, name: &str) -> Option<ReservoirId> {
        self.reservoirs
            .iter()
            .position(|reservoir| reservoir.name == name)
            .map(ReservoirId)
    }

    /// Checks that `level` is a valid occupancy of `id`.
    pub fn check_level(&self, id: CofactorId, level: usize) -> Result<()> {
        let capacity = self.cofactor(id)?.capacity();
        if level > capacity {
            return Err(KineticsError::InvalidLevel {
                cofactor: id.0,
                level,
                capacity,
            });
        }
        Ok(())
    }

    pub fn cofactors(&self) -> &[Cofactor] {
        &self.cofactors
    }

    pub fn reservoirs(&self) -> &[Reservoir] {
        &self.reservoirs
    }

    pub fn num_cofactors(&self) -> usize {
        self.cofactors.len()
    }

    pub fn capacities(&self) -> Vec<usize> {
        self.cofactors.iter().map(Cofactor::capacity).collect()
    }
}

impl fmt::Display for Cofactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cofactor {} (capacity {})", self.name, self.capacity())?;
        for (i, potential) in self.redox.iter().enumerate() {
            writeln!(f, "  {} -> {} electrons: {:+.3} eV", i, i + 1, potential)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_sequential() {
        let mut registry = Registry::new();
        let a = registry.add_cofactor("A", vec![-0.5]).unwrap();
        let b = registry.add_cofactor("B", vec![0.0, 0.1]).unwrap();
        assert_eq!(a, CofactorId(0));
        assert_eq!(b, CofactorId(1));
        assert_eq!(registry.capacities(), vec![1, 2]);
        assert_eq!(registry.cofactor_id("B").unwrap(), b);
        assert_eq!(registry.cofactor(b).unwrap().potential(2), Some(0.1));
        assert_eq!(registry.cofactor(b).unwrap().potential(0), None);
    }

    #[test]
    fn reservoir_validation() {
        let mut registry = Registry::new();
        let a = registry.add_cofactor("A", vec![-0.5, -0.2]).unwrap();
        assert!(registry.add_reservoir("drain", a, 1, 1, 0.1, 1e3).is_ok());
        assert!(matches!(
            registry.add_reservoir("drain", a, 1, 1, 0.1, 1e3),
            Err(KineticsError::DuplicateReservoir(_))
        ));
        assert!(matches!(
            registry.add_reservoir("deep", a, 3, 1, 0.1, 1e3),
            Err(KineticsError::InvalidLevel { .. })
        ));
        assert!(matches!(
            registry.add_reservoir("pair", a, 1, 2, 0.1, 1e3),
            Err(KineticsError::InvalidLevel { .. })
        ));
        assert!(matches!(
            registry.add_reservoir("ghost", CofactorId(7), 1, 1, 0.1, 1e3),
            Err(KineticsError::UnknownCofactor(_))
        ));
        assert_eq!(registry.reservoir_id("drain").unwrap(), ReservoirId(0));
    }

    #[test]
    fn rejects_empty_ladder() {
        let mut registry = Registry::new();
        assert!(registry.add_cofactor("X", vec![]).is_err());
    }
}
