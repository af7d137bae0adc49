//! Per-cell best signal coefficient produced by one `simulate` call.
//!
//! Cells only ever go up: engines call [`SignalMap::raise`] whenever they reach a cell, and the map
//! keeps the strongest coefficient seen. Queries between grid nodes interpolate in the dB domain.

use super::geometry::Point;
use super::signal_calculations::{Power, PowerCoefficient};
use super::space::{DiscretePoint, GridFrame};
use super::types::{Receiver, Transmitter};

#[derive(Debug, Clone, PartialEq)]
pub struct SignalMap {
    frame: GridFrame,
    cells: Vec<PowerCoefficient>,
}

impl SignalMap {
    /// Map with every cell at zero.
    pub fn new(frame: GridFrame) -> Self {
        Self {
            cells: vec![PowerCoefficient::ZERO; frame.cell_count()],
            frame,
        }
    }

    pub fn frame(&self) -> &GridFrame {
        &self.frame
    }

    /// Keep `value` if it beats the stored coefficient. Out-of-grid cells are ignored.
    pub fn raise(&mut self, point: DiscretePoint, value: PowerCoefficient) {
        if !self.frame.in_range(point) {
            return;
        }
        let cell = &mut self.cells[self.frame.index(point)];
        if value > *cell {
            *cell = value;
        }
    }

    pub fn coefficient(&self, point: DiscretePoint) -> Option<PowerCoefficient> {
        if !self.frame.in_range(point) {
            return None;
        }
        Some(self.cells[self.frame.index(point)])
    }

    /// Power a receiver would see right at a grid node.
    pub fn received_power(&self, point: DiscretePoint, transmitter: &Transmitter, receiver: &Receiver) -> Power {
        match self.coefficient(point) {
            Some(coefficient) => transmitter.eirp() * receiver.antenna_gain * coefficient,
            None => Power::ZERO,
        }
    }

    /// Received power at an arbitrary position.
    ///
    /// The four nodes around `position` are averaged in dB, each weighted by
    /// `(1 - |dx| / precision) * (1 - |dy| / precision)`. Nodes outside the grid or with zero weight
    /// are left out and the remaining weights renormalized. A node that was never reached contributes
    /// `-inf` dB, so any unreached corner with a positive weight yields zero power.
    ///
    /// # Returns
    ///
    /// [`Power::ZERO`] for positions outside the surface.
    pub fn signal_strength(&self, position: Point, transmitter: &Transmitter, receiver: &Receiver) -> Power {
        if !self.frame.contains_position(position) {
            return Power::ZERO;
        }

        let precision = self.frame.precision();
        let base = self.frame.discrete_point(position);
        let corners = [
            base,
            DiscretePoint::new(base.x + 1, base.y),
            DiscretePoint::new(base.x + 1, base.y + 1),
            DiscretePoint::new(base.x, base.y + 1),
        ];

        let mut weighted_db = 0.0;
        let mut total_weight = 0.0;
        for corner in corners {
            let Some(coefficient) = self.coefficient(corner) else {
                continue;
            };
            let node = self.frame.position(corner);
            let weight = (1.0 - (position.x - node.x).abs() / precision) * (1.0 - (position.y - node.y).abs() / precision);
            if weight <= 0.0 {
                continue;
            }
            weighted_db += weight * coefficient.db();
            total_weight += weight;
        }

        if total_weight <= 0.0 {
            return Power::ZERO;
        }

        let coefficient = PowerCoefficient::from_db(weighted_db / total_weight);
        transmitter.eirp() * receiver.antenna_gain * coefficient
    }

    /// Every cell with its coefficient, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (DiscretePoint, PowerCoefficient)> + '_ {
        self.frame.points().zip(self.cells.iter().copied())
    }

    /// Strongest coefficient anywhere on the map.
    pub fn peak(&self) -> PowerCoefficient {
        self.cells.iter().copied().fold(PowerCoefficient::ZERO, |best, c| if c > best { c } else { best })
    }

    /// Number of cells the signal reached.
    pub fn covered_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.linear() > 0.0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::geometry::Rectangle;
    use crate::simulation::signal_calculations::AntennaGain;

    fn frame() -> GridFrame {
        GridFrame::new(Rectangle::from_corners(Point::new(0.0, 0.0), Point::new(4.0, 4.0)), 1.0).unwrap()
    }

    fn unit_tx() -> Transmitter {
        Transmitter::new(Power::from_milliwatts(1.0), AntennaGain::default())
    }

    fn filled(value: PowerCoefficient) -> SignalMap {
        let mut map = SignalMap::new(frame());
        for point in frame().points() {
            map.raise(point, value);
        }
        map
    }

    #[test]
    fn raise_only_increases() {
        let mut map = SignalMap::new(frame());
        let cell = DiscretePoint::new(1, 2);
        map.raise(cell, PowerCoefficient(0.5));
        map.raise(cell, PowerCoefficient(0.1));
        assert_eq!(map.coefficient(cell), Some(PowerCoefficient(0.5)));
        map.raise(cell, PowerCoefficient(0.7));
        assert_eq!(map.coefficient(cell), Some(PowerCoefficient(0.7)));

        map.raise(DiscretePoint::new(-1, 0), PowerCoefficient(1.0));
        assert_eq!(map.coefficient(DiscretePoint::new(-1, 0)), None);
        assert_eq!(map.covered_cells(), 1);
        assert_eq!(map.peak(), PowerCoefficient(0.7));
    }

    #[test]
    fn uniform_map_interpolates_to_the_same_value() {
        let map = filled(PowerCoefficient::from_db(-40.0));
        let tx = Transmitter::new(Power::from_dbm(10.0), AntennaGain::from_dbi(2.0));
        let rx = Receiver::new(AntennaGain::from_dbi(1.0));
        for position in [Point::new(0.3, 0.7), Point::new(2.0, 2.0), Point::new(3.99, 0.01), Point::new(4.0, 4.0)] {
            let power = map.signal_strength(position, &tx, &rx);
            assert!((power.dbm() - -27.0).abs() < 1e-9, "{:?} -> {}", position, power.dbm());
        }
    }

    #[test]
    fn interpolation_is_linear_in_db() {
        let mut map = SignalMap::new(frame());
        for point in frame().points() {
            let db = if point.x <= 1 { -20.0 } else { -60.0 };
            map.raise(point, PowerCoefficient::from_db(db));
        }
        let rx = Receiver::default();
        // Halfway between column 1 (-20 dB) and column 2 (-60 dB)
        let mid = map.signal_strength(Point::new(1.5, 2.0), &unit_tx(), &rx);
        assert!((mid.dbm() - -40.0).abs() < 1e-9);
        let quarter = map.signal_strength(Point::new(1.25, 2.5), &unit_tx(), &rx);
        assert!((quarter.dbm() - -30.0).abs() < 1e-9);
    }

    #[test]
    fn exact_node_uses_only_that_node() {
        let mut map = SignalMap::new(frame());
        map.raise(DiscretePoint::new(2, 2), PowerCoefficient::from_db(-30.0));
        let power = map.signal_strength(Point::new(2.0, 2.0), &unit_tx(), &Receiver::default());
        assert!((power.dbm() - -30.0).abs() < 1e-9);
    }

    #[test]
    fn outside_surface_is_zero_power() {
        let map = filled(PowerCoefficient::ONE);
        let rx = Receiver::default();
        assert_eq!(map.signal_strength(Point::new(-0.1, 2.0), &unit_tx(), &rx), Power::ZERO);
        assert_eq!(map.signal_strength(Point::new(2.0, 4.5), &unit_tx(), &rx), Power::ZERO);
    }

    #[test]
    fn unreached_corner_gives_zero_power() {
        let map = SignalMap::new(frame());
        let power = map.signal_strength(Point::new(1.5, 1.5), &unit_tx(), &Receiver::default());
        assert_eq!(power.milliwatts(), 0.0);
    }

    #[test]
    fn received_power_at_node() {
        let map = filled(PowerCoefficient::from_db(-50.0));
        let tx = Transmitter::new(Power::from_dbm(20.0), AntennaGain::from_dbi(3.0));
        let p = map.received_power(DiscretePoint::new(0, 0), &tx, &Receiver::default());
        assert!((p.dbm() - -27.0).abs() < 1e-9);
        assert_eq!(map.received_power(DiscretePoint::new(9, 9), &tx, &Receiver::default()), Power::ZERO);
        assert_eq!(map.iter().count(), frame().cell_count());
    }
}
