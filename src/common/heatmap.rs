//! Heatmap export of simulated signal maps.
//!
//! One pixel per grid cell, with the image y axis flipped so that north is up. Colors follow a
//! blue → cyan → green → yellow → red ramp over a configurable dBm range.

use chrono::{DateTime, Utc};
use image::{GrayImage, Luma, Rgb, RgbImage};
use serde::Serialize;

use crate::simulation::geometry::Point;
use crate::simulation::signal_map::SignalMap;
use crate::simulation::space::{DiscretePoint, DiscretizedSpace, GridFrame};
use crate::simulation::types::{Receiver, Transmitter};

const OBSTACLE_COLOR: Rgb<u8> = Rgb([128, 128, 128]);
const UNCOVERED_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Per-cell count of obstacles containing the cell node.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingMap {
    frame: GridFrame,
    counts: Vec<u32>,
}

impl BuildingMap {
    pub fn new(space: &DiscretizedSpace) -> Self {
        let frame = *space.frame();
        let counts = frame
            .points()
            .map(|point| {
                let position = frame.position(point);
                space.obstacles().iter().filter(|o| o.inside(position)).count() as u32
            })
            .collect();
        Self { frame, counts }
    }

    pub fn count(&self, point: DiscretePoint) -> u32 {
        if !self.frame.in_range(point) {
            return 0;
        }
        self.counts[self.frame.index(point)]
    }
}

/// Received power range mapped onto the color ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbmRange {
    pub min: f64,
    pub max: f64,
}

impl DbmRange {
    /// Position of `dbm` within the range, clamped to `0..=1`.
    fn normalized(&self, dbm: f64) -> f64 {
        ((dbm - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}

fn ramp(t: f64) -> Rgb<u8> {
    let scaled = t * 4.0;
    let (r, g, b) = match scaled {
        s if s < 1.0 => (0.0, s, 1.0),
        s if s < 2.0 => (0.0, 1.0, 2.0 - s),
        s if s < 3.0 => (s - 2.0, 1.0, 0.0),
        s => (1.0, (4.0 - s).max(0.0), 0.0),
    };
    Rgb([(r * 255.0).round() as u8, (g * 255.0).round() as u8, (b * 255.0).round() as u8])
}

fn pixel(frame: &GridFrame, point: DiscretePoint) -> (u32, u32) {
    (point.x as u32, (frame.height() - 1 - point.y) as u32)
}

/// Received power per cell; `None` where the signal never arrived.
fn cell_dbm(map: &SignalMap, point: DiscretePoint, transmitter: &Transmitter, receiver: &Receiver) -> Option<f64> {
    let power = map.received_power(point, transmitter, receiver);
    if power.milliwatts() > 0.0 { Some(power.dbm()) } else { None }
}

/// Color heatmap: obstacles gray, unreached cells black, the rest on the color ramp.
pub fn render_heatmap(map: &SignalMap, building: &BuildingMap, transmitter: &Transmitter, receiver: &Receiver, range: DbmRange) -> RgbImage {
    let frame = map.frame();
    let mut image = RgbImage::new(frame.width() as u32, frame.height() as u32);

    for (point, _) in map.iter() {
        let color = if building.count(point) > 0 {
            OBSTACLE_COLOR
        } else {
            match cell_dbm(map, point, transmitter, receiver) {
                Some(dbm) => ramp(range.normalized(dbm)),
                None => UNCOVERED_COLOR,
            }
        };
        let (x, y) = pixel(frame, point);
        image.put_pixel(x, y, color);
    }

    image
}

/// Grayscale export: brightness proportional to the position within `range`, unreached cells black.
pub fn render_grayscale(map: &SignalMap, transmitter: &Transmitter, receiver: &Receiver, range: DbmRange) -> GrayImage {
    let frame = map.frame();
    let mut image = GrayImage::new(frame.width() as u32, frame.height() as u32);

    for (point, _) in map.iter() {
        let level = cell_dbm(map, point, transmitter, receiver)
            .map(|dbm| (range.normalized(dbm) * 255.0).round() as u8)
            .unwrap_or(0);
        let (x, y) = pixel(frame, point);
        image.put_pixel(x, y, Luma([level]));
    }

    image
}

/// Summary of one transmitter's map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransmitterReport {
    pub name: String,
    pub position: Point,
    /// Strongest received power on the map, absent when nothing was reached.
    pub peak_dbm: Option<f64>,
    pub covered_cells: usize,
    /// Share of cells at or above the range minimum.
    pub coverage_ratio: f64,
}

impl TransmitterReport {
    pub fn new(name: &str, position: Point, map: &SignalMap, transmitter: &Transmitter, receiver: &Receiver, range: DbmRange) -> Self {
        let peak = transmitter.eirp() * receiver.antenna_gain * map.peak();
        let above_floor = map
            .iter()
            .filter(|(point, _)| cell_dbm(map, *point, transmitter, receiver).is_some_and(|dbm| dbm >= range.min))
            .count();

        Self {
            name: name.to_string(),
            position,
            peak_dbm: (peak.milliwatts() > 0.0).then(|| peak.dbm()),
            covered_cells: map.covered_cells(),
            coverage_ratio: above_floor as f64 / map.frame().cell_count() as f64,
        }
    }
}

/// Run summary written next to the images.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub scene: String,
    pub engine: String,
    pub grid_width: i32,
    pub grid_height: i32,
    pub precision: f64,
    pub transmitters: Vec<TransmitterReport>,
}
