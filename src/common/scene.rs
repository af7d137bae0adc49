//! Scene loading, parsing, and validation logic.
//!
//! A scene describes the floor plan (obstacles made of named materials), the simulated surface and
//! grid resolution, the carrier frequency and the transmitters to map. Loading validates everything
//! up front so that building the discretized space afterwards cannot fail on user input.

use anyhow::Context;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use thiserror::Error;

use crate::simulation::geometry::{Point, Polygon, Rectangle, Shape};
use crate::simulation::obstacle::{Obstacle, UniformObstacle};
use crate::simulation::signal_calculations::{AbsorptionCoefficient, AntennaGain, Frequency, Power, PowerCoefficient};
use crate::simulation::space::{DirectionSet, DiscretizedSpace};
use crate::simulation::types::{Material, Receiver, Transmitter};

/// Error type for scene loading failures.
#[derive(Debug, Error)]
pub enum SceneLoadError {
    #[error("Failed to read file: {0}")]
    FileReadError(String),
    #[error("Failed to parse JSON: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Material as written in the scene: losses measured over a reference thickness.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MaterialDefinition {
    /// Reflection loss in dB (<= 0). Missing means the material does not reflect.
    #[serde(default)]
    pub reflection_db: Option<f64>,
    /// Loss in dB (<= 0) through `thickness` meters of the material.
    pub absorption_db: f64,
    /// Reference thickness in meters for `absorption_db`.
    pub thickness: f64,
}

impl MaterialDefinition {
    pub fn material(&self) -> Result<Material, String> {
        if !(self.thickness > 0.0) {
            return Err(format!("thickness must be positive, got {}", self.thickness));
        }
        if self.absorption_db > 0.0 {
            return Err(format!("absorption_db {} must not be a gain", self.absorption_db));
        }
        let reflection = match self.reflection_db {
            Some(db) if db > 0.0 => return Err(format!("reflection_db {} must not be a gain", db)),
            Some(db) => PowerCoefficient::from_db(db),
            None => PowerCoefficient::ZERO,
        };
        Material::new(reflection, AbsorptionCoefficient::from_db(self.absorption_db, self.thickness)).map_err(|e| e.to_string())
    }
}

/// Rectangle position with two corners.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RectPos {
    #[serde(rename = "top-left-position")]
    pub top_left: Point,
    #[serde(rename = "bottom-right-position")]
    pub bottom_right: Point,
}

/// Obstacle shapes represented as tagged enum.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ShapeDefinition {
    #[serde(rename = "polygon")]
    Polygon { points: Vec<Point> },
    #[serde(rename = "rectangle")]
    Rectangle {
        #[serde(flatten)]
        position: RectPos,
    },
    #[serde(rename = "wall")]
    Wall { from: Point, to: Point, thickness: f64 },
    /// Material of `exterior` with `interior` cut out.
    #[serde(rename = "difference")]
    Difference {
        exterior: Box<ShapeDefinition>,
        interior: Box<ShapeDefinition>,
    },
}

impl ShapeDefinition {
    pub fn shape(&self) -> Result<Shape, String> {
        match self {
            ShapeDefinition::Polygon { points } => Polygon::new(points.clone()).map(Shape::from).map_err(|e| e.to_string()),
            ShapeDefinition::Rectangle { position } => {
                let (a, b) = (position.top_left, position.bottom_right);
                if a.x == b.x || a.y == b.y {
                    return Err(format!(
                        "rectangle ({}, {}) - ({}, {}) has zero area",
                        a.x, a.y, b.x, b.y
                    ));
                }
                Ok(Polygon::rectangle(a, b).into())
            }
            ShapeDefinition::Wall { from, to, thickness } => Polygon::wall(*from, *to, *thickness).map(Shape::from).map_err(|e| e.to_string()),
            ShapeDefinition::Difference { exterior, interior } => Ok(Shape::difference(exterior.shape()?, interior.shape()?)),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ObstacleDefinition {
    /// Key into the scene's `materials`.
    pub material: String,
    #[serde(flatten)]
    pub shape: ShapeDefinition,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TransmitterDefinition {
    /// Used to name the output files.
    pub name: String,
    pub position: Point,
    pub power_dbm: f64,
    #[serde(default)]
    pub antenna_gain_dbi: f64,
}

impl TransmitterDefinition {
    pub fn transmitter(&self) -> Transmitter {
        Transmitter::new(Power::from_dbm(self.power_dbm), AntennaGain::from_dbi(self.antenna_gain_dbi))
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct ReceiverDefinition {
    #[serde(default)]
    pub antenna_gain_dbi: f64,
}

/// Root structure representing the entire scene.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Scene {
    /// Simulated area. Defaults to the bounding box of all obstacles.
    #[serde(default)]
    pub surface: Option<Rectangle>,
    /// Grid spacing in meters.
    pub precision: f64,
    pub frequency_ghz: f64,
    #[serde(default)]
    pub directions: DirectionSet,
    #[serde(default)]
    pub materials: BTreeMap<String, MaterialDefinition>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleDefinition>,
    pub transmitters: Vec<TransmitterDefinition>,
    #[serde(default)]
    pub receiver: ReceiverDefinition,
}

impl Scene {
    pub fn frequency(&self) -> Frequency {
        Frequency::from_ghz(self.frequency_ghz)
    }

    pub fn receiver(&self) -> Receiver {
        Receiver::new(AntennaGain::from_dbi(self.receiver.antenna_gain_dbi))
    }

    /// Explicit surface, or the bounding box of every obstacle.
    pub fn surface(&self) -> Result<Rectangle, SceneLoadError> {
        if let Some(surface) = self.surface {
            return Ok(surface);
        }
        let mut bounds: Option<Rectangle> = None;
        for obstacle in &self.obstacles {
            let shape_bounds = obstacle.shape.shape().map_err(SceneLoadError::ValidationError)?.bounds();
            bounds = Some(match bounds {
                Some(b) => b.union(&shape_bounds),
                None => shape_bounds,
            });
        }
        bounds.ok_or_else(|| SceneLoadError::ValidationError("Scene without obstacles must define 'surface'".to_string()))
    }

    pub fn build_obstacles(&self) -> Result<Vec<Box<dyn Obstacle>>, SceneLoadError> {
        self.obstacles
            .iter()
            .enumerate()
            .map(|(idx, definition)| {
                let material = self
                    .materials
                    .get(&definition.material)
                    .ok_or_else(|| format!("Obstacle {} uses unknown material '{}'", idx, definition.material))?
                    .material()
                    .map_err(|e| format!("Material '{}': {}", definition.material, e))?;
                let shape = definition.shape.shape().map_err(|e| format!("Obstacle {}: {}", idx, e))?;
                Ok(Box::new(UniformObstacle::new(shape, material)) as Box<dyn Obstacle>)
            })
            .collect::<Result<Vec<_>, String>>()
            .map_err(SceneLoadError::ValidationError)
    }

    /// Precompute the discretized space for this scene.
    pub fn build_space(&self) -> Result<DiscretizedSpace, SceneLoadError> {
        let obstacles = self.build_obstacles()?;
        DiscretizedSpace::with_directions(obstacles, self.surface()?, self.precision, self.frequency(), self.directions)
            .map_err(|e| SceneLoadError::ValidationError(e.to_string()))
    }
}

/// Load and parse a scene from a file.
///
/// # Parameters
///
/// * `path` - Path to the scene JSON file
///
/// # Returns
///
/// Parsed and validated Scene or an error.
pub fn load_scene(path: &str) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| SceneLoadError::FileReadError(e.to_string()))?;

    parse_scene(&data)
}

/// Parse and validate a scene from its JSON text.
pub fn parse_scene(data: &str) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(format!("{:#}", e)))?;

    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;

    debug!(
        "Scene loaded: {} materials, {} obstacles, {} transmitters",
        scene.materials.len(),
        scene.obstacles.len(),
        scene.transmitters.len()
    );

    Ok(scene)
}

/// Validate scene configuration.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    const MAX_TRANSMITTERS: usize = 1000;
    const MIN_POWER_DBM: f64 = -50.0;
    const MAX_POWER_DBM: f64 = 60.0;

    if !(scene.precision > 0.0) || !scene.precision.is_finite() {
        return Err(format!("Invalid precision {}, must be a positive distance", scene.precision));
    }
    if !(scene.frequency_ghz > 0.0) || !scene.frequency_ghz.is_finite() {
        return Err(format!("Invalid frequency_ghz {}, must be positive", scene.frequency_ghz));
    }

    // Check transmitter count
    if scene.transmitters.is_empty() {
        return Err("Scene must contain at least one transmitter".to_string());
    }
    if scene.transmitters.len() > MAX_TRANSMITTERS {
        return Err(format!(
            "Transmitter count {} exceeds maximum of {}",
            scene.transmitters.len(),
            MAX_TRANSMITTERS
        ));
    }

    // Materials are checked even when unused
    for (name, definition) in &scene.materials {
        definition.material().map_err(|e| format!("Material '{}': {}", name, e))?;
    }

    // Builds every shape and resolves every material reference
    let obstacles = scene.build_obstacles().map_err(validation_message)?;

    let surface = scene.surface().map_err(validation_message)?;
    if !(surface.width() > 0.0 && surface.height() > 0.0) {
        return Err(format!("Surface {} x {} must have a positive area", surface.width(), surface.height()));
    }

    // Check for duplicate transmitter names
    let mut names = HashSet::new();
    for transmitter in &scene.transmitters {
        if !names.insert(transmitter.name.as_str()) {
            return Err(format!("Duplicate transmitter name found: {}", transmitter.name));
        }
    }

    for transmitter in &scene.transmitters {
        if !surface.contains(transmitter.position) {
            return Err(format!(
                "Transmitter {} position ({}, {}) is outside the surface",
                transmitter.name, transmitter.position.x, transmitter.position.y
            ));
        }
        if transmitter.power_dbm < MIN_POWER_DBM || transmitter.power_dbm > MAX_POWER_DBM {
            return Err(format!(
                "Transmitter {} power {} dBm outside realistic range ({} to {} dBm)",
                transmitter.name, transmitter.power_dbm, MIN_POWER_DBM, MAX_POWER_DBM
            ));
        }
        if obstacles.iter().any(|o| o.inside(transmitter.position)) {
            warn!("Transmitter {} is placed inside an obstacle", transmitter.name);
        }
    }

    Ok(())
}

fn validation_message(error: SceneLoadError) -> String {
    match error {
        SceneLoadError::ValidationError(message) => message,
        other => other.to_string(),
    }
}
