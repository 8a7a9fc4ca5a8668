/// A continuous-time Markov chain over a finite set of numbered states, as
/// seen by the trajectory sampler.
pub trait MarkovChain {
    fn num_states(&self) -> usize;

    /// Rate of jumping from `from` to `to` (`from != to`).
    fn rate(&self, from: usize, to: usize) -> f64;

    /// Total rate of leaving `from`. Zero marks an absorbing state.
    fn exit_rate(&self, from: usize) -> f64;

    /// The state reached by a jump out of `from`, given `u` drawn uniformly
    /// from `[0, exit_rate(from))`. An absorbing state returns itself.
    fn jump(&self, from: usize, u: f64) -> usize;
}
