use thiserror::Error;

/// Everything that can go wrong while assembling or evolving a network.
#[derive(Debug, Error)]
pub enum KineticsError {
    #[error("unknown cofactor: {0}")]
    UnknownCofactor(String),

    #[error("unknown reservoir: {0}")]
    UnknownReservoir(String),

    #[error("duplicate reservoir name: {0}")]
    DuplicateReservoir(String),

    #[error("invalid distance {distance} between cofactors {first} and {second}")]
    InvalidDistance {
        first: usize,
        second: usize,
        distance: f64,
    },

    #[error("cofactors {first} and {second} can hold electrons together but have no distance")]
    MissingDistance { first: usize, second: usize },

    #[error("cofactors {donor} and {acceptor} are not connected")]
    NotConnected { donor: usize, acceptor: usize },

    #[error("redox level {level} is outside the capacity {capacity} of cofactor {cofactor}")]
    InvalidLevel {
        cofactor: usize,
        level: usize,
        capacity: usize,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no microstate holds between {min} and {max} electrons")]
    EmptyStateSpace { min: usize, max: usize },

    #[error("expected a vector of length {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("rate out of range ({rate}) for deltaG = {delta_g} eV: {reason}")]
    RateOutOfRange {
        rate: f64,
        delta_g: f64,
        reason: &'static str,
    },

    #[error("matrix exponential failed: {0}")]
    PropagationFailed(String),

    #[error("invalid population: {0}")]
    InvalidPopulation(String),

    #[error("trajectory exceeded {limit} events before reaching its last checkpoint")]
    EventLimitExceeded { limit: usize },

    #[error("could not parse parameters: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, KineticsError>;
