//! Direct-path baseline: free-space loss times straight-line obstacle absorption, no reflections
//! and no diffraction.

use log::{debug, warn};
use std::sync::Arc;

use super::SignalSimulation;
use super::geometry::{FreeVector, Point};
use super::signal_calculations::{PowerCoefficient, free_space_coefficient};
use super::signal_map::SignalMap;
use super::space::DiscretizedSpace;
use super::types::LinkBudget;

/// Shift applied to the transmitter so that straight segments never pass exactly through polygon
/// vertices placed on the grid.
const TRANSMITTER_JITTER: FreeVector = FreeVector::new(1e-4, 2e-4);

pub struct FriisSimulation {
    space: Arc<DiscretizedSpace>,
    minimum_coefficient: PowerCoefficient,
}

impl FriisSimulation {
    pub fn new(space: Arc<DiscretizedSpace>, link_budget: LinkBudget) -> Self {
        Self {
            space,
            minimum_coefficient: link_budget.minimum_coefficient(),
        }
    }
}

impl SignalSimulation for FriisSimulation {
    /// Cells weaker than the link-budget floor are left at zero.
    fn simulate(&self, transmitter_position: Point) -> SignalMap {
        let frame = self.space.frame();
        let frequency = self.space.frequency();
        let source = transmitter_position + TRANSMITTER_JITTER;
        let mut map = SignalMap::new(*frame);

        if !frame.in_range(frame.discrete_point(transmitter_position)) {
            warn!(
                "Transmitter at ({:.2}, {:.2}) is outside the grid",
                transmitter_position.x, transmitter_position.y
            );
            return map;
        }

        for point in frame.points() {
            let position = frame.position(point);
            let distance = source.distance_to(position);

            let absorbed = self
                .space
                .obstacles()
                .iter()
                .fold(PowerCoefficient::ONE, |c, obstacle| {
                    c * obstacle.absorption(source, position, frequency).coefficient(distance)
                });

            let strength = absorbed * free_space_coefficient(frequency, distance);
            if strength >= self.minimum_coefficient {
                map.raise(point, strength);
            }
        }

        debug!(
            "Friis from ({:.2}, {:.2}): {} cells covered",
            transmitter_position.x,
            transmitter_position.y,
            map.covered_cells()
        );

        map
    }
}
