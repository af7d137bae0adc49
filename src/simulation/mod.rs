//! Signal propagation core.
//!
//! This module turns a set of obstacles into a precomputed, immutable propagation medium and runs
//! the propagation engines over it. It integrates:
//! - Unit algebra for power, coefficients, absorption and antenna gain
//! - Continuous geometry and constructive solid geometry for obstacle shapes
//! - The discretized space and its per-edge connection table
//! - Three engines sharing the [`SignalSimulation`] trait
//!
//! ## Module Organization
//!
//! - `signal_calculations`: Units and free-space loss
//! - `geometry`: Points, vectors, intersections, polygons and CSG shapes
//! - `types`: Materials, transmitter/receiver, link budget, configuration errors
//! - `obstacle`: The obstacle trait and the uniform-material implementation
//! - `space`: Grid frame, quantized directions and connection table
//! - `signal_map`: Per-cell result of one simulation, with interpolated queries
//! - `raycasting`, `wavefront`, `friis`: The propagation engines
//!
//! ## Concurrency
//!
//! `simulate` itself is single-threaded. The space is shared read-only through `Arc`, so independent
//! transmitters can be simulated in parallel with [`simulate_batch`], which fans out over rayon.

pub mod friis;
pub mod geometry;
pub mod obstacle;
pub mod raycasting;
pub mod signal_calculations;
pub mod signal_map;
pub mod space;
pub mod types;
pub mod wavefront;

use log::debug;
use rayon::prelude::*;
use std::time::Instant;

pub use friis::FriisSimulation;
pub use geometry::{Point, Rectangle};
pub use obstacle::{Obstacle, UniformObstacle};
pub use raycasting::{RaycastingParameters, RaycastingSimulation};
pub use signal_map::SignalMap;
pub use space::{DirectionSet, DiscretizedSpace};
pub use types::{ConfigError, LinkBudget, Material, Receiver, Transmitter};
pub use wavefront::{WavefrontParameters, WavefrontSimulation};

/// A propagation engine bound to one discretized space.
pub trait SignalSimulation: Send + Sync {
    /// Compute the best coefficient reaching every cell from a transmitter at `transmitter_position`.
    ///
    /// Positions outside the grid produce an empty map.
    fn simulate(&self, transmitter_position: Point) -> SignalMap;
}

/// Simulate several transmitters in parallel on the rayon thread pool.
///
/// # Returns
///
/// One map per position, in input order.
pub fn simulate_batch(simulation: &dyn SignalSimulation, positions: &[Point]) -> Vec<SignalMap> {
    let started = Instant::now();
    let maps: Vec<SignalMap> = positions.par_iter().map(|position| simulation.simulate(*position)).collect();

    debug!(
        "Simulated {} transmitters on {} threads in {} ms",
        positions.len(),
        rayon::current_num_threads(),
        started.elapsed().as_millis()
    );

    maps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::geometry::{Polygon, Shape};
    use crate::simulation::signal_calculations::{AbsorptionCoefficient, AntennaGain, Frequency, Power, PowerCoefficient, free_space_coefficient};
    use std::sync::Arc;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn budget() -> LinkBudget {
        LinkBudget::new(
            Transmitter::new(Power::from_dbm(0.0), AntennaGain::default()),
            Receiver::default(),
            Power::from_dbm(-140.0),
        )
        .unwrap()
    }

    fn surface() -> Rectangle {
        Rectangle::from_corners(p(0.0, 0.0), p(12.0, 12.0))
    }

    fn engines(space: &Arc<DiscretizedSpace>) -> Vec<Box<dyn SignalSimulation>> {
        let raycasting = RaycastingSimulation::new(
            space.clone(),
            RaycastingParameters {
                rays_count: 720,
                reflection_count: 2,
                link_budget: budget(),
            },
        )
        .unwrap();
        let wavefront = WavefrontSimulation::new(
            space.clone(),
            WavefrontParameters {
                turn_coefficient: PowerCoefficient::from_db(-3.0),
                link_budget: budget(),
            },
        )
        .unwrap();
        let friis = FriisSimulation::new(space.clone(), budget());

        let engines: Vec<Box<dyn SignalSimulation>> = vec![Box::new(raycasting), Box::new(wavefront), Box::new(friis)];
        engines
    }

    /// Closed square ring; its interior is only reachable through 1 m of lossy material.
    fn ring() -> Box<dyn Obstacle> {
        let material = Material::new(PowerCoefficient::from_db(-3.0), AbsorptionCoefficient::from_alpha(50.0)).unwrap();
        let shape = Shape::difference(
            Polygon::rectangle(p(6.1, 6.1), p(11.1, 11.1)),
            Polygon::rectangle(p(7.1, 7.1), p(10.1, 10.1)),
        );
        Box::new(UniformObstacle::new(shape, material))
    }

    #[test]
    fn engines_agree_with_free_space_law() {
        let space = Arc::new(DiscretizedSpace::new(Vec::new(), surface(), 0.25, Frequency::from_ghz(2.4)).unwrap());
        let tx = p(5.0, 5.0);
        let rx = Receiver::default();
        let transmitter = Transmitter::new(Power::from_dbm(10.0), AntennaGain::default());

        for engine in engines(&space) {
            let map = engine.simulate(tx);
            for target in [p(8.0, 5.0), p(5.0, 1.0), p(8.0, 8.0)] {
                let expected = 10.0 + free_space_coefficient(space.frequency(), tx.distance_to(target)).db();
                let power = map.signal_strength(target, &transmitter, &rx);
                assert!((power.dbm() - expected).abs() < 0.02, "{} vs {}", power.dbm(), expected);
            }
        }
    }

    #[test]
    fn closed_ring_occludes_its_interior() {
        let space = Arc::new(DiscretizedSpace::new(vec![ring()], surface(), 0.25, Frequency::from_ghz(2.4)).unwrap());
        let frame = space.frame();
        let inside = frame.discrete_point(p(8.5, 8.5));
        let outside = frame.discrete_point(p(2.0, 9.0));

        for engine in engines(&space) {
            let map = engine.simulate(p(2.0, 2.0));
            assert!(map.coefficient(inside).unwrap().linear() < 1e-15);
            assert!(map.coefficient(outside).unwrap().linear() > 1e-7);
        }
    }

    #[test]
    fn all_engines_stay_in_unit_range_and_are_idempotent() {
        let space = Arc::new(DiscretizedSpace::new(vec![ring()], surface(), 0.25, Frequency::from_ghz(2.4)).unwrap());
        for engine in engines(&space) {
            let first = engine.simulate(p(3.3, 2.7));
            assert!(first.iter().all(|(_, c)| (0.0..=1.0).contains(&c.linear())));
            assert_eq!(first, engine.simulate(p(3.3, 2.7)));
        }
    }

    #[test]
    fn transmitter_outside_grid_yields_empty_maps() {
        let space = Arc::new(DiscretizedSpace::new(Vec::new(), surface(), 0.5, Frequency::from_ghz(2.4)).unwrap());
        for engine in engines(&space) {
            assert_eq!(engine.simulate(p(-20.0, 5.0)).covered_cells(), 0);
        }
    }

    #[test]
    fn wavefront_reaches_behind_corners_better_than_friis() {
        let material = Material::new(PowerCoefficient::ZERO, AbsorptionCoefficient::from_alpha(1000.0)).unwrap();
        let block: Box<dyn Obstacle> = Box::new(UniformObstacle::new(Polygon::rectangle(p(4.1, 0.1), p(4.9, 6.1)), material));
        let space = Arc::new(DiscretizedSpace::new(vec![block], surface(), 0.25, Frequency::from_ghz(2.4)).unwrap());
        let shadow = space.frame().discrete_point(p(8.0, 3.0));

        let friis = FriisSimulation::new(space.clone(), budget()).simulate(p(2.0, 2.0));
        let wavefront = WavefrontSimulation::new(
            space.clone(),
            WavefrontParameters {
                turn_coefficient: PowerCoefficient::from_db(-3.0),
                link_budget: budget(),
            },
        )
        .unwrap()
        .simulate(p(2.0, 2.0));

        assert!(wavefront.coefficient(shadow) > friis.coefficient(shadow));
    }

    #[test]
    fn batch_matches_sequential_runs() {
        let space = Arc::new(DiscretizedSpace::new(vec![ring()], surface(), 0.5, Frequency::from_ghz(2.4)).unwrap());
        let positions = [p(1.0, 1.0), p(5.5, 2.5), p(3.0, 10.0), p(11.0, 4.0), p(9.0, 1.0)];

        for engine in engines(&space) {
            let batch = simulate_batch(engine.as_ref(), &positions);
            assert_eq!(batch.len(), positions.len());
            for (map, position) in batch.iter().zip(positions) {
                assert_eq!(*map, engine.simulate(position));
            }
        }
        assert!(simulate_batch(&FriisSimulation::new(space, budget()), &[]).is_empty());
    }
}
