//! Discretized simulation space.
//!
//! The continuous surface is sampled on a uniform grid of nodes spaced `precision` meters apart.
//! For every node and every quantized direction the space precomputes a [`Connection`]: the
//! absorption and reflection an obstacle set imposes on the micro-edge from the node to its
//! neighbor in that direction. The table is built once and is read-only afterwards, so one space
//! can back any number of engines and concurrent `simulate` calls.
//!
//! ## Grid layout
//!
//! ```text
//! node (x, y)  ↔  surface.min + (x, y) * precision
//! size         =  floor(extent / precision) + 2   per axis
//! ```
//!
//! The two extra nodes per axis guarantee that every position inside the surface has all four
//! surrounding nodes on the grid.

use log::{debug, info};
use std::ops::Add;
use std::time::Instant;

use super::geometry::{FreeVector, Point, Rectangle};
use super::obstacle::{Distortion, Obstacle};
use super::signal_calculations::{AbsorptionCoefficient, Frequency};
use super::types::ConfigError;

/// Grid node coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DiscretePoint {
    pub x: i32,
    pub y: i32,
}

impl DiscretePoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add<DiscreteDirection> for DiscretePoint {
    type Output = DiscretePoint;

    fn add(self, direction: DiscreteDirection) -> DiscretePoint {
        DiscretePoint::new(self.x + direction.x, self.y + direction.y)
    }
}

/// Integer grid step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscreteDirection {
    pub x: i32,
    pub y: i32,
}

impl DiscreteDirection {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Unit vector of this step.
    pub fn vector(&self) -> FreeVector {
        FreeVector::new(self.x as f64, self.y as f64).normalized()
    }
}

const AXIS_DIRECTIONS: [DiscreteDirection; 4] = [
    DiscreteDirection::new(1, 0),
    DiscreteDirection::new(-1, 0),
    DiscreteDirection::new(0, 1),
    DiscreteDirection::new(0, -1),
];

const SIXTEEN_DIRECTIONS: [DiscreteDirection; 16] = [
    DiscreteDirection::new(-2, -1),
    DiscreteDirection::new(-2, 1),
    DiscreteDirection::new(-1, -2),
    DiscreteDirection::new(-1, -1),
    DiscreteDirection::new(-1, 0),
    DiscreteDirection::new(-1, 1),
    DiscreteDirection::new(-1, 2),
    DiscreteDirection::new(0, -1),
    DiscreteDirection::new(0, 1),
    DiscreteDirection::new(1, -2),
    DiscreteDirection::new(1, -1),
    DiscreteDirection::new(1, 0),
    DiscreteDirection::new(1, 1),
    DiscreteDirection::new(1, 2),
    DiscreteDirection::new(2, -1),
    DiscreteDirection::new(2, 1),
];

/// Fixed set of quantized directions a space is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionSet {
    /// The four axis steps.
    Axis4,
    /// All steps with components in `-2..=2` and no common divisor.
    #[default]
    Sixteen,
}

impl DirectionSet {
    pub fn directions(&self) -> &'static [DiscreteDirection] {
        match self {
            DirectionSet::Axis4 => &AXIS_DIRECTIONS,
            DirectionSet::Sixteen => &SIXTEEN_DIRECTIONS,
        }
    }

    pub fn len(&self) -> usize {
        self.directions().len()
    }

    pub fn index_of(&self, direction: DiscreteDirection) -> Option<usize> {
        self.directions().iter().position(|d| *d == direction)
    }

    /// Index of the direction closest (highest cosine) to `vector`. A zero vector maps to index 0.
    pub fn quantize(&self, vector: FreeVector) -> usize {
        quantize_among(self.directions(), vector, |_| true)
    }

    /// Index of the axis step (`(±1, 0)` or `(0, ±1)`) closest to `vector`. Every set contains them.
    pub fn quantize_axis(&self, vector: FreeVector) -> usize {
        quantize_among(self.directions(), vector, |d| d.x == 0 || d.y == 0)
    }
}

fn quantize_among(directions: &[DiscreteDirection], vector: FreeVector, accept: impl Fn(&DiscreteDirection) -> bool) -> usize {
    let normalized = vector.normalized();
    let mut best = 0;
    let mut best_dot = f64::NEG_INFINITY;
    for (i, direction) in directions.iter().enumerate().filter(|(_, d)| accept(*d)) {
        let dot = direction.vector().dot(normalized);
        if dot > best_dot {
            best_dot = dot;
            best = i;
        }
    }
    best
}

/// Mapping between continuous positions and grid nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridFrame {
    surface: Rectangle,
    precision: f64,
    width: i32,
    height: i32,
}

impl GridFrame {
    pub fn new(surface: Rectangle, precision: f64) -> Result<Self, ConfigError> {
        if !(precision > 0.0) || !precision.is_finite() {
            return Err(ConfigError::InvalidPrecision(precision));
        }
        if !(surface.width() > 0.0 && surface.height() > 0.0) {
            return Err(ConfigError::EmptySurface {
                width: surface.width(),
                height: surface.height(),
            });
        }
        let (Some(width), Some(height)) = (node_count(surface.width(), precision), node_count(surface.height(), precision)) else {
            return Err(ConfigError::GridTooLarge {
                width: surface.width(),
                height: surface.height(),
                precision,
            });
        };
        Ok(Self {
            surface,
            precision,
            width,
            height,
        })
    }

    pub fn surface(&self) -> Rectangle {
        self.surface
    }

    /// Distance between neighboring nodes in meters.
    pub fn precision(&self) -> f64 {
        self.precision
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Continuous position of a grid node.
    pub fn position(&self, point: DiscretePoint) -> Point {
        Point::new(
            self.surface.min.x + point.x as f64 * self.precision,
            self.surface.min.y + point.y as f64 * self.precision,
        )
    }

    /// Node at or just below/left of a continuous position.
    pub fn discrete_point(&self, position: Point) -> DiscretePoint {
        DiscretePoint::new(
            ((position.x - self.surface.min.x) / self.precision).floor() as i32,
            ((position.y - self.surface.min.y) / self.precision).floor() as i32,
        )
    }

    /// Position relative to its node, in cell units (`0..1` per axis).
    pub fn sub_cell_offset(&self, position: Point) -> FreeVector {
        let node = self.position(self.discrete_point(position));
        FreeVector::between(node, position) * (1.0 / self.precision)
    }

    pub fn in_range(&self, point: DiscretePoint) -> bool {
        point.x >= 0 && point.x < self.width && point.y >= 0 && point.y < self.height
    }

    pub fn contains_position(&self, position: Point) -> bool {
        self.surface.contains(position)
    }

    /// Row-major index; callers check [`GridFrame::in_range`] first.
    pub fn index(&self, point: DiscretePoint) -> usize {
        point.y as usize * self.width as usize + point.x as usize
    }

    /// All grid nodes, row by row.
    pub fn points(&self) -> impl Iterator<Item = DiscretePoint> + use<> {
        let (width, height) = (self.width, self.height);
        (0..height).flat_map(move |y| (0..width).map(move |x| DiscretePoint::new(x, y)))
    }
}

/// Nodes along one axis, `floor(extent / precision) + 2`, when it fits in `i32`.
fn node_count(extent: f64, precision: f64) -> Option<i32> {
    let cells = (extent / precision).floor();
    if cells.is_finite() && cells + 2.0 <= i32::MAX as f64 {
        Some(cells as i32 + 2)
    } else {
        None
    }
}

/// Obstacle interaction along one micro-edge of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Connection {
    pub absorption: AbsorptionCoefficient,
    pub reflection: Distortion,
}

/// Precomputed, immutable propagation medium.
pub struct DiscretizedSpace {
    frame: GridFrame,
    frequency: Frequency,
    directions: DirectionSet,
    obstacles: Vec<Box<dyn Obstacle>>,
    connections: Vec<Connection>,
}

impl DiscretizedSpace {
    /// Build a space with the sixteen-direction quantization.
    pub fn new(obstacles: Vec<Box<dyn Obstacle>>, surface: Rectangle, precision: f64, frequency: Frequency) -> Result<Self, ConfigError> {
        Self::with_directions(obstacles, surface, precision, frequency, DirectionSet::Sixteen)
    }

    /// Build a space and precompute its connection table.
    ///
    /// Cost is O(cells × directions × obstacles); every obstacle is queried for every micro-edge.
    ///
    /// # Errors
    ///
    /// Fails fast on a non-positive precision, an empty surface or a non-positive wavelength.
    pub fn with_directions(
        obstacles: Vec<Box<dyn Obstacle>>,
        surface: Rectangle,
        precision: f64,
        frequency: Frequency,
        directions: DirectionSet,
    ) -> Result<Self, ConfigError> {
        let frame = GridFrame::new(surface, precision)?;
        if !(frequency.wavelength() > 0.0) || !frequency.wavelength().is_finite() {
            return Err(ConfigError::InvalidFrequency(frequency.wavelength()));
        }

        let started = Instant::now();
        let steps = directions.directions();
        let mut connections = vec![Connection::default(); frame.cell_count() * steps.len()];

        for point in frame.points() {
            let begin = frame.position(point);
            let base = frame.index(point) * steps.len();

            for (i, step) in steps.iter().enumerate() {
                let end = frame.position(point + *step);
                let connection = &mut connections[base + i];

                for obstacle in &obstacles {
                    connection.absorption = connection.absorption + obstacle.absorption(begin, end, frequency);
                    connection.reflection = connection.reflection.merge(obstacle.distortion(begin, end, frequency));
                }
            }
        }

        debug!(
            "Connection table: {} reflective and {} absorbing micro-edges",
            connections.iter().filter(|c| c.reflection.reflects()).count(),
            connections.iter().filter(|c| c.absorption.affects()).count()
        );
        info!(
            "Discretized {}x{} grid ({} directions, {} obstacles) in {} ms",
            frame.width(),
            frame.height(),
            steps.len(),
            obstacles.len(),
            started.elapsed().as_millis()
        );

        Ok(Self {
            frame,
            frequency,
            directions,
            obstacles,
            connections,
        })
    }

    pub fn frame(&self) -> &GridFrame {
        &self.frame
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn directions(&self) -> DirectionSet {
        self.directions
    }

    pub fn obstacles(&self) -> &[Box<dyn Obstacle>] {
        &self.obstacles
    }

    /// Connection leaving `point` along the direction with index `direction`.
    pub fn connection(&self, point: DiscretePoint, direction: usize) -> &Connection {
        &self.connections[self.frame.index(point) * self.directions.len() + direction]
    }

    /// Whether the straight segment between two positions is clear of every obstacle.
    pub fn in_sight(&self, begin: Point, end: Point) -> bool {
        self.obstacles.iter().all(|obstacle| obstacle.in_sight(begin, end))
    }
}
