use redox_network::*;
use std::fs;
use tqdm::tqdm;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error + 'static>> {
    tracing_subscriber::fmt::init();

    let parameters = match std::env::args().nth(1) {
        Some(path) => MarcusParameters::from_json(&fs::read_to_string(path)?)?,
        None => MarcusParameters::default(),
    };
    distance_sweep(parameters)
}

/// Site potentials (eV) and spacings (Å) of the bifurcating hole-transfer
/// chain: a two-electron center E between a high-potential branch H1..H3 and
/// a low-potential branch L1..L3.
struct Bifurcation {
    potentials: [f64; 7],
    distance_h: f64,
    distance_l: f64,
    distance: f64,
}

fn distance_sweep(parameters: MarcusParameters) -> Result<(), Box<dyn std::error::Error + 'static>> {
    let parameters = parameters.with_reorganization_energy(0.75);
    let time = 1.0;
    let spacings: Vec<f64> = (0..11).map(|i| 5.0 + i as f64).collect();

    let mut yields = Vec::with_capacity(spacings.len());
    for distance in tqdm(spacings.into_iter()) {
        let bifurcation = Bifurcation {
            potentials: [-1.8, -2.5, -0.4, -2.5, -0.4, -2.6, -0.3],
            distance_h: 10.0,
            distance_l: 10.0,
            distance,
        };
        let network = bifurcation.build(parameters.clone())?;
        let initial = network.point_population(network.num_states() - 1)?;
        let population = network.evolve(time, &initial)?;
        yields.push((distance, population[0]));
    }

    for (distance, final_yield) in yields {
        info!("spacing {:5.2} Å: yield {:.6}", distance, final_yield);
    }
    Ok(())
}

impl Bifurcation {
    fn build(&self, parameters: MarcusParameters) -> Result<Network, KineticsError> {
        let [g1, g2, g3, g4, g5, g6, g7] = self.potentials;
        let (d, dh, dl) = (self.distance, self.distance_h, self.distance_l);

        let mut builder = NetworkBuilder::with_parameters(parameters);
        let e = builder.add_cofactor("E", vec![g1, 0.])?;
        let h1 = builder.add_cofactor("H1", vec![g2])?;
        let l1 = builder.add_cofactor("L1", vec![g3])?;
        let h2 = builder.add_cofactor("H2", vec![g4])?;
        let l2 = builder.add_cofactor("L2", vec![g5])?;
        let h3 = builder.add_cofactor("H3", vec![g6])?;
        let l3 = builder.add_cofactor("L3", vec![g7])?;

        let connections = [
            (h3, h2, d),
            (h3, h1, 2. * d),
            (h3, e, 2. * d + dh),
            (h3, l1, 2. * d + dh + dl),
            (h3, l2, 3. * d + dh + dl),
            (h3, l3, 4. * d + dh + dl),
            (h2, h1, d),
            (h2, e, d + dh),
            (h2, l1, d + dh + dl),
            (h2, l2, 2. * d + dh + dl),
            (h2, l3, 3. * d + dh + dl),
            (h1, e, dh),
            (h1, l1, dh + dl),
            (h1, l2, d + dh + dl),
            (h1, l3, 2. * d + dh + dl),
            (e, l1, dl),
            (e, l2, dl + d),
            (e, l3, dl + 2. * d),
            (l1, l2, d),
            (l1, l3, 2. * d),
            (l2, l3, d),
        ];
        for (first, second, distance) in connections {
            builder.add_connection(first, second, distance)?;
        }
        builder.set_electron_bounds(6, 6);

        let network = builder.build()?;
        let n = network.num_states();
        // The product state traps, and the two partially separated groups of
        // states may only move forward.
        network.masked(&[
            TransitionMask::outflow(0, n),
            TransitionMask::new(1..6, 6..n),
            TransitionMask::new(6..11, 11..n),
        ])
    }
}
