use rand::prelude::*;
use rand::rngs::StdRng;
use redox_network::*;

/// Three sites with a small downhill step between neighbours and a coupling
/// weak enough that every rate is of order one per second.
fn slow_chain() -> Network {
    let parameters = MarcusParameters::default().with_coupling(1e-4);
    let mut builder = NetworkBuilder::with_parameters(parameters);
    let a = builder.add_cofactor("A", vec![-0.30]).unwrap();
    let b = builder.add_cofactor("B", vec![-0.28]).unwrap();
    let c = builder.add_cofactor("C", vec![-0.26]).unwrap();
    builder.add_connection(a, b, 10.).unwrap();
    builder.add_connection(b, c, 10.).unwrap();
    builder.set_electron_bounds(1, 1);
    builder.build().unwrap()
}

#[test]
fn rates_are_of_order_one() {
    let network = slow_chain();
    let chain = network.rate_matrix();
    for state in 0..network.num_states() {
        let exit = chain.exit_rate(state);
        assert!(exit > 0.05 && exit < 20., "exit rate {} from {}", exit, state);
    }
}

#[test]
fn sampler_matches_reference_gillespie() {
    let network = slow_chain();
    let matrix = network.rate_matrix().as_array().clone();
    let initial = network.state_index(&[1, 0, 0]).unwrap();
    let config = SimulationConfig {
        max_events: 1_000_000,
        record_jumps: true,
    };
    let rng = StdRng::seed_from_u64(1);
    let path = simulate(network.rate_matrix(), initial, &[50.], &config, &mut rng.clone()).unwrap();
    assert!(path.jumps.len() > 10);

    let mut rng = rng;
    let mut state = initial;
    for (step, &(dt, next)) in path.jumps.iter().enumerate() {
        let total: f64 = (0..matrix.nrows())
            .filter(|&j| j != state)
            .map(|j| matrix[[j, state]])
            .sum();
        let expected_dt = -(1. - rng.random::<f64>()).ln() / total;
        let u = rng.random::<f64>() * total;
        let mut sum = 0.;
        let mut expected_next = state;
        for j in 0..matrix.nrows() {
            if j == state || matrix[[j, state]] <= 0. {
                continue;
            }
            sum += matrix[[j, state]];
            expected_next = j;
            if u < sum {
                break;
            }
        }
        let difference = (dt - expected_dt).abs();
        if difference >= 2_f64.powi(-40) * dt {
            panic!(
                "Holding times differ on step {}: {} vs {}",
                step, dt, expected_dt
            );
        }
        assert_eq!(next, expected_next, "jump {} went elsewhere", step);
        state = next;
    }
}

#[test]
fn ensemble_matches_propagator() {
    let network = slow_chain();
    let initial = network
        .point_population(network.state_index(&[1, 0, 0]).unwrap())
        .unwrap();
    let checkpoints = [0.5, 1., 2.];
    let exact: Vec<_> = checkpoints
        .iter()
        .map(|&t| network.evolve(t, &initial).unwrap())
        .collect();

    // Four standard errors of a binomial proportion, which shrink as 1/√N.
    for n_trials in [1000, 16000] {
        let tolerance = 4. * 0.5 / (n_trials as f64).sqrt();
        let histogram = ensemble(
            network.rate_matrix(),
            &initial,
            &checkpoints,
            n_trials,
            7,
            &SimulationConfig::default(),
        )
        .unwrap();

        for ((row, expected), &t) in histogram.outer_iter().zip(exact.iter()).zip(checkpoints.iter()) {
            for (sampled, propagated) in row.iter().zip(expected.iter()) {
                assert!(
                    (sampled - propagated).abs() < tolerance,
                    "{} trials at t = {}: sampled {} vs propagated {}",
                    n_trials,
                    t,
                    sampled,
                    propagated
                );
            }
        }
    }
}

#[test]
fn dwell_times_approach_the_stationary_distribution() {
    let network = slow_chain();
    let initial = network.state_index(&[1, 0, 0]).unwrap();
    let final_time = 5000.;
    let config = SimulationConfig {
        max_events: 1_000_000,
        record_jumps: true,
    };
    let mut rng = StdRng::seed_from_u64(23);
    let path = simulate(network.rate_matrix(), initial, &[final_time], &config, &mut rng).unwrap();
    let dwell = dwell_times(initial, &path.jumps, final_time, network.num_states());
    assert!((dwell.sum() - final_time).abs() < 1e-6 * final_time);

    let beta = network.parameters().beta;
    let weights = network.free_energies().mapv(|g| (-beta * g).exp());
    let stationary = &weights / weights.sum();
    for (time, expected) in dwell.iter().zip(stationary.iter()) {
        assert!((time / final_time - expected).abs() < 0.05);
    }
}
