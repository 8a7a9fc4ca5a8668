pub mod analysis;
pub mod distance;
pub mod error;
pub mod free_energy;
pub mod markov_chain;
pub mod network;
pub mod parameters;
pub mod propagate;
pub mod rate_law;
pub mod rate_matrix;
pub mod registry;
pub mod simulate;
pub mod state_space;
pub mod transition;

pub use analysis::dwell_times;
pub use error::KineticsError;
pub use markov_chain::MarkovChain;
pub use network::{ConnectedPair, Network, NetworkBuilder};
pub use parameters::MarcusParameters;
pub use propagate::{expm, transition_matrix};
pub use rate_law::{backward_rate, marcus_rate, reservoir_rate};
pub use rate_matrix::{RateMatrix, TransitionMask};
pub use registry::{Cofactor, CofactorId, Registry, Reservoir, ReservoirId};
pub use simulate::{ensemble, sample_state, simulate, SimulationConfig, Trajectory};
pub use state_space::StateSpace;
pub use transition::Transition;
