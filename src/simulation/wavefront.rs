//! Wavefront engine: breadth-first relaxation over quantized directions.
//!
//! Cells in direct line of sight of the transmitter are seeded with the full coefficient. From there
//! the energy spreads round by round to neighboring cells in every quantized direction, paying the
//! micro-edge absorption and a penalty for changing direction. This lets the signal bend around
//! corners, which the straight-line engines cannot do.
//!
//! The best coefficient is kept per (cell, incoming direction) in an arena owned by the call, and an
//! entry only re-enters the frontier on a strict improvement.

use log::{debug, warn};
use std::sync::Arc;

use super::SignalSimulation;
use super::geometry::{FreeVector, Point};
use super::signal_calculations::{PowerCoefficient, free_space_coefficient};
use super::signal_map::SignalMap;
use super::space::{DiscretePoint, DiscretizedSpace};
use super::types::{ConfigError, LinkBudget};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavefrontParameters {
    /// Coefficient applied for a full reversal; straight continuation costs nothing.
    pub turn_coefficient: PowerCoefficient,
    pub link_budget: LinkBudget,
}

/// Frontier entry.
#[derive(Debug, Clone, Copy)]
struct Front {
    point: DiscretePoint,
    direction: usize,
    distance: f64,
}

pub struct WavefrontSimulation {
    space: Arc<DiscretizedSpace>,
    minimum_coefficient: PowerCoefficient,
    /// `turns[incoming * n + outgoing]`
    turns: Vec<PowerCoefficient>,
    /// Length in meters of one step in each direction.
    step_lengths: Vec<f64>,
}

impl WavefrontSimulation {
    pub fn new(space: Arc<DiscretizedSpace>, parameters: WavefrontParameters) -> Result<Self, ConfigError> {
        let turn = parameters.turn_coefficient.linear();
        if !(turn > 0.0 && turn <= 1.0) {
            return Err(ConfigError::InvalidTurnPenalty(parameters.turn_coefficient.db()));
        }

        let directions = space.directions().directions();
        let turn_db = parameters.turn_coefficient.db();
        let turns = directions
            .iter()
            .flat_map(|incoming| {
                directions.iter().map(move |outgoing| {
                    let cos = incoming.vector().dot(outgoing.vector());
                    let fraction = 1.0 - (cos + 1.0) / 2.0;
                    PowerCoefficient::from_db(turn_db * fraction)
                })
            })
            .collect();

        let precision = space.frame().precision();
        let step_lengths = directions
            .iter()
            .map(|d| FreeVector::new(d.x as f64, d.y as f64).length() * precision)
            .collect();

        Ok(Self {
            space,
            minimum_coefficient: parameters.link_budget.minimum_coefficient(),
            turns,
            step_lengths,
        })
    }

    /// Line-of-sight cells, each marked with full strength in the direction it is seen from.
    fn seed(&self, transmitter_position: Point, best: &mut [PowerCoefficient]) -> Vec<Front> {
        let frame = self.space.frame();
        let directions = self.space.directions();
        let n = directions.len();

        frame
            .points()
            .filter_map(|point| {
                let position = frame.position(point);
                if !self.space.in_sight(transmitter_position, position) {
                    return None;
                }
                let direction = directions.quantize(FreeVector::between(transmitter_position, position));
                best[frame.index(point) * n + direction] = PowerCoefficient::ONE;
                Some(Front {
                    point,
                    direction,
                    distance: transmitter_position.distance_to(position),
                })
            })
            .collect()
    }
}

impl SignalSimulation for WavefrontSimulation {
    fn simulate(&self, transmitter_position: Point) -> SignalMap {
        let frame = self.space.frame();
        let frequency = self.space.frequency();
        let directions = self.space.directions().directions();
        let n = directions.len();
        let mut map = SignalMap::new(*frame);

        if !frame.in_range(frame.discrete_point(transmitter_position)) {
            warn!(
                "Transmitter at ({:.2}, {:.2}) is outside the grid",
                transmitter_position.x, transmitter_position.y
            );
            return map;
        }

        let mut best = vec![PowerCoefficient::ZERO; frame.cell_count() * n];
        let mut frontier = self.seed(transmitter_position, &mut best);
        let mut next = Vec::new();
        let seeded = frontier.len();
        let mut rounds = 0usize;
        let mut relaxations = 0usize;

        while !frontier.is_empty() {
            rounds += 1;

            for front in frontier.drain(..) {
                let coefficient = best[frame.index(front.point) * n + front.direction];
                let strength = coefficient * free_space_coefficient(frequency, front.distance);
                map.raise(front.point, strength);

                if strength < self.minimum_coefficient {
                    continue;
                }

                for (i, step) in directions.iter().enumerate() {
                    let destination = front.point + *step;
                    if !frame.in_range(destination) {
                        continue;
                    }

                    let length = self.step_lengths[i];
                    let connection = self.space.connection(front.point, i);
                    let candidate = coefficient * self.turns[front.direction * n + i] * connection.absorption.coefficient(length);

                    let slot = &mut best[frame.index(destination) * n + i];
                    if candidate > *slot {
                        *slot = candidate;
                        relaxations += 1;
                        next.push(Front {
                            point: destination,
                            direction: i,
                            distance: front.distance + length,
                        });
                    }
                }
            }

            std::mem::swap(&mut frontier, &mut next);
        }

        debug!(
            "Wavefront from ({:.2}, {:.2}): {} seeded, {} rounds, {} relaxations, {} cells covered",
            transmitter_position.x,
            transmitter_position.y,
            seeded,
            rounds,
            relaxations,
            map.covered_cells()
        );

        map
    }
}
