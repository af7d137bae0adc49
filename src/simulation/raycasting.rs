//! Specular raycasting engine.
//!
//! Rays leave the transmitter at evenly spaced angles and walk the grid cell by cell, DDA style:
//! each step follows the ray from its sub-cell offset to the first cell boundary it reaches and
//! crosses it with the matching axis step, so the visited cells are exactly the ones the straight
//! ray passes through. The precomputed absorption of that micro-edge is raised over the length the
//! ray travelled inside the cell; reflective edges spawn a mirrored clone while the reflection
//! budget lasts.
//!
//! Termination: every step moves the ray one cell along a fixed direction, so each ray eventually
//! leaves the grid or drops below the link-budget floor. Reflections are bounded by the budget.

use log::{debug, warn};
use std::f64::consts::PI;
use std::sync::Arc;

use super::SignalSimulation;
use super::geometry::{FreeVector, Point};
use super::signal_calculations::{PowerCoefficient, free_space_coefficient};
use super::signal_map::SignalMap;
use super::space::{DiscretePoint, DiscretizedSpace};
use super::types::{ConfigError, LinkBudget};

/// Angle of the first ray; keeps rays off exact grid diagonals.
const FIRST_RAY_ANGLE: f64 = 0.123;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastingParameters {
    pub rays_count: usize,
    /// Bounces allowed per ray lineage.
    pub reflection_count: u32,
    pub link_budget: LinkBudget,
}

#[derive(Debug, Clone, Copy)]
struct RayState {
    point: DiscretePoint,
    /// Path length up to the last bounce.
    distance: f64,
    /// Where the current straight leg started.
    source: Point,
    direction: FreeVector,
    /// Position relative to `point`, in cell units, within `0..=1` per axis.
    offset: FreeVector,
    reflections: u32,
    coefficient: PowerCoefficient,
}

pub struct RaycastingSimulation {
    space: Arc<DiscretizedSpace>,
    parameters: RaycastingParameters,
    minimum_coefficient: PowerCoefficient,
}

impl RaycastingSimulation {
    pub fn new(space: Arc<DiscretizedSpace>, parameters: RaycastingParameters) -> Result<Self, ConfigError> {
        if parameters.rays_count == 0 {
            return Err(ConfigError::NoRays);
        }
        Ok(Self {
            space,
            minimum_coefficient: parameters.link_budget.minimum_coefficient(),
            parameters,
        })
    }

    fn seed(&self, transmitter_position: Point) -> Vec<RayState> {
        let frame = self.space.frame();
        let point = frame.discrete_point(transmitter_position);
        let offset = frame.sub_cell_offset(transmitter_position);
        let count = self.parameters.rays_count;

        (0..count)
            .map(|i| {
                let angle = FIRST_RAY_ANGLE + 2.0 * PI * i as f64 / count as f64;
                RayState {
                    point,
                    distance: 0.0,
                    source: transmitter_position,
                    direction: FreeVector::from_angle(angle),
                    offset,
                    reflections: self.parameters.reflection_count,
                    coefficient: PowerCoefficient::ONE,
                }
            })
            .collect()
    }
}

impl SignalSimulation for RaycastingSimulation {
    fn simulate(&self, transmitter_position: Point) -> SignalMap {
        let frame = self.space.frame();
        let frequency = self.space.frequency();
        let directions = self.space.directions();
        let mut map = SignalMap::new(*frame);

        if !frame.in_range(frame.discrete_point(transmitter_position)) {
            warn!(
                "Transmitter at ({:.2}, {:.2}) is outside the grid",
                transmitter_position.x, transmitter_position.y
            );
            return map;
        }

        let mut stack = self.seed(transmitter_position);
        let mut steps = 0usize;
        let mut reflected = 0usize;

        while let Some(mut ray) = stack.pop() {
            if !frame.in_range(ray.point) {
                continue;
            }

            let node = frame.position(ray.point);
            let distance = ray.distance + ray.source.distance_to(node);
            let strength = ray.coefficient * free_space_coefficient(frequency, distance);
            if strength < self.minimum_coefficient {
                continue;
            }

            map.raise(ray.point, strength);
            steps += 1;

            let (axis_vector, travel) = next_crossing(ray.offset, ray.direction);
            let axis_index = directions.quantize_axis(axis_vector);
            let axis = directions.directions()[axis_index];
            let connection = self.space.connection(ray.point, axis_index);

            if ray.reflections > 0 && connection.reflection.reflects() {
                let normal = connection.reflection.normal;
                stack.push(RayState {
                    direction: ray.direction.reflected_by(normal).normalized(),
                    coefficient: ray.coefficient * connection.reflection.coefficient,
                    distance,
                    source: node,
                    reflections: ray.reflections - 1,
                    ..ray
                });
                reflected += 1;
            }

            ray.coefficient = ray.coefficient * connection.absorption.coefficient(travel * frame.precision());
            ray.point = ray.point + axis;
            let crossed = ray.offset + ray.direction * travel - axis_vector;
            ray.offset = FreeVector::new(crossed.dx.clamp(0.0, 1.0), crossed.dy.clamp(0.0, 1.0));
            stack.push(ray);
        }

        debug!(
            "Raycasting from ({:.2}, {:.2}): {} steps, {} reflections, {} cells covered",
            transmitter_position.x,
            transmitter_position.y,
            steps,
            reflected,
            map.covered_cells()
        );

        map
    }
}

/// First cell boundary hit from `offset` (cell units, `0..=1` per axis) along `direction`.
///
/// Returns the axis step crossing that boundary and the distance to it in cell units. Ties go to
/// the vertical step.
fn next_crossing(offset: FreeVector, direction: FreeVector) -> (FreeVector, f64) {
    let exit = |position: f64, speed: f64| {
        if speed > 0.0 {
            ((1.0 - position) / speed).max(0.0)
        } else if speed < 0.0 {
            (position / -speed).max(0.0)
        } else {
            f64::INFINITY
        }
    };
    let horizontal = exit(offset.dx, direction.dx);
    let vertical = exit(offset.dy, direction.dy);

    if horizontal < vertical {
        (FreeVector::new(direction.dx.signum(), 0.0), horizontal)
    } else {
        (FreeVector::new(0.0, direction.dy.signum()), vertical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::friis::FriisSimulation;
    use crate::simulation::geometry::{Polygon, Rectangle};
    use crate::simulation::obstacle::{Obstacle, UniformObstacle};
    use crate::simulation::signal_calculations::{AbsorptionCoefficient, AntennaGain, Frequency, Power};
    use crate::simulation::types::{Material, Receiver, Transmitter};

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn budget(minimum_dbm: f64) -> LinkBudget {
        LinkBudget::new(
            Transmitter::new(Power::from_dbm(0.0), AntennaGain::default()),
            Receiver::default(),
            Power::from_dbm(minimum_dbm),
        )
        .unwrap()
    }

    fn parameters(reflection_count: u32) -> RaycastingParameters {
        RaycastingParameters {
            rays_count: 720,
            reflection_count,
            link_budget: budget(-140.0),
        }
    }

    fn space(obstacles: Vec<Box<dyn Obstacle>>) -> Arc<DiscretizedSpace> {
        let surface = Rectangle::from_corners(p(0.0, 0.0), p(12.0, 12.0));
        Arc::new(DiscretizedSpace::new(obstacles, surface, 0.25, Frequency::from_ghz(2.4)).unwrap())
    }

    fn block(a: Point, b: Point, reflection_db: Option<f64>, alpha: f64) -> Box<dyn Obstacle> {
        let reflection = reflection_db.map(PowerCoefficient::from_db).unwrap_or(PowerCoefficient::ZERO);
        let material = Material::new(reflection, AbsorptionCoefficient::from_alpha(alpha)).unwrap();
        Box::new(UniformObstacle::new(Polygon::rectangle(a, b), material))
    }

    #[test]
    fn zero_rays_is_rejected() {
        let params = RaycastingParameters {
            rays_count: 0,
            ..parameters(0)
        };
        assert!(matches!(RaycastingSimulation::new(space(Vec::new()), params), Err(ConfigError::NoRays)));
    }

    #[test]
    fn free_space_matches_friis_on_visited_cells() {
        let space = space(Vec::new());
        let simulation = RaycastingSimulation::new(space.clone(), parameters(0)).unwrap();
        let tx = p(5.0, 5.0);
        let map = simulation.simulate(tx);
        let frame = space.frame();

        let mut checked = 0;
        for (point, coefficient) in map.iter() {
            if coefficient.linear() == 0.0 {
                continue;
            }
            let expected = free_space_coefficient(space.frequency(), tx.distance_to(frame.position(point)));
            assert!((coefficient.db() - expected.db()).abs() < 1e-9, "{:?}", point);
            checked += 1;
        }
        assert!(checked > 100);
        assert_eq!(map.coefficient(frame.discrete_point(tx)), Some(PowerCoefficient::ONE));
    }

    #[test]
    fn single_ray_visits_only_cells_on_its_line() {
        let space = space(Vec::new());
        let params = RaycastingParameters {
            rays_count: 1,
            ..parameters(0)
        };
        let tx = p(1.0, 1.0);
        let map = RaycastingSimulation::new(space.clone(), params).unwrap().simulate(tx);
        let frame = space.frame();
        let precision = frame.precision();
        let slope = FIRST_RAY_ANGLE.tan();

        let mut visited = 0;
        for (point, _) in map.iter().filter(|(_, c)| c.linear() > 0.0) {
            let corner = frame.position(point);
            let low = tx.x + (corner.y - tx.y) * slope;
            let high = tx.x + (corner.y + precision - tx.y) * slope;
            assert!(low <= corner.x + precision + 1e-9 && high >= corner.x - 1e-9, "{:?}", point);
            visited += 1;
        }
        assert!(visited > 40);

        // At y = 11 m the ray is at x = 2.24 m
        assert!(map.coefficient(frame.discrete_point(p(2.1, 11.1))).unwrap().linear() > 0.0);
        assert_eq!(map.coefficient(frame.discrete_point(p(1.8, 11.1))), Some(PowerCoefficient::ZERO));
    }

    #[test]
    fn without_reflections_matches_friis_behind_absorbing_wall() {
        // 10 dB through 0.5 m; the faces sit just below the node columns at x = 6.0 and 6.5
        let alpha = AbsorptionCoefficient::from_db(-10.0, 0.5).alpha();
        let space = space(vec![block(p(5.999, -1.0), p(6.499, 13.0), None, alpha)]);
        let params = RaycastingParameters {
            rays_count: 3600,
            ..parameters(0)
        };
        let tx = p(2.0, 6.0);
        let rays = RaycastingSimulation::new(space.clone(), params).unwrap().simulate(tx);
        let friis = FriisSimulation::new(space.clone(), budget(-140.0)).simulate(tx);
        let frame = space.frame();

        for target in [p(9.0, 6.0), p(9.0, 9.0), p(9.0, 2.0), p(10.0, 11.0), p(11.0, 4.0)] {
            let cell = frame.discrete_point(target);
            let ray_db = rays.coefficient(cell).unwrap().db();
            let friis_db = friis.coefficient(cell).unwrap().db();
            assert!((ray_db - friis_db).abs() < 0.3, "{:?}: {} vs {}", target, ray_db, friis_db);
        }
    }

    #[test]
    fn coefficients_stay_within_unit_range() {
        let obstacles = vec![
            block(p(4.1, 0.1), p(4.9, 6.1), Some(-1.0), 3.0),
            block(p(0.1, 9.1), p(11.9, 9.3), Some(-0.5), 1.0),
        ];
        let simulation = RaycastingSimulation::new(space(obstacles), parameters(3)).unwrap();
        let map = simulation.simulate(p(2.0, 2.0));
        for (_, coefficient) in map.iter() {
            assert!((0.0..=1.0).contains(&coefficient.linear()));
        }
    }

    #[test]
    fn reflections_never_lower_a_cell() {
        let obstacles = || {
            vec![
                block(p(4.1, 0.1), p(4.9, 6.1), None, 1000.0),
                block(p(0.1, 9.1), p(11.9, 9.3), Some(-1.0), 1000.0),
            ]
        };
        let direct = RaycastingSimulation::new(space(obstacles()), parameters(0)).unwrap().simulate(p(2.0, 2.0));
        let bounced = RaycastingSimulation::new(space(obstacles()), parameters(1)).unwrap().simulate(p(2.0, 2.0));

        let mut direct_sum = 0.0;
        let mut bounced_sum = 0.0;
        for ((point, a), (_, b)) in direct.iter().zip(bounced.iter()) {
            assert!(b >= a, "{:?}: {:?} < {:?}", point, b, a);
            direct_sum += a.linear();
            bounced_sum += b.linear();
        }
        assert!(bounced_sum > direct_sum);
    }

    #[test]
    fn simulate_is_idempotent() {
        let obstacles = vec![block(p(6.1, 2.1), p(6.6, 9.9), Some(-3.0), 5.0)];
        let simulation = RaycastingSimulation::new(space(obstacles), parameters(2)).unwrap();
        assert_eq!(simulation.simulate(p(3.3, 4.4)), simulation.simulate(p(3.3, 4.4)));
    }

    #[test]
    fn transmitter_outside_grid_yields_empty_map() {
        let simulation = RaycastingSimulation::new(space(Vec::new()), parameters(0)).unwrap();
        let map = simulation.simulate(p(-50.0, -50.0));
        assert_eq!(map.covered_cells(), 0);
    }
}
