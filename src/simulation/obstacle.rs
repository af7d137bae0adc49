//! Obstacles: shapes made of a material, queried along short segments.
//!
//! The discretized space asks every obstacle three questions about each micro-edge of the grid:
//! how much of the power is absorbed, which reflective surfaces face the travel direction, and
//! (for line-of-sight seeding) whether the segment is unobstructed at all.

use super::geometry::{FreeVector, Point, Ray, Shape};
use super::signal_calculations::{AbsorptionCoefficient, Frequency, PowerCoefficient};
use super::types::Material;

/// Reflective event along a segment: surface normal plus reflection coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Distortion {
    pub normal: FreeVector,
    pub coefficient: PowerCoefficient,
}

impl Distortion {
    pub const NONE: Distortion = Distortion {
        normal: FreeVector::ZERO,
        coefficient: PowerCoefficient::ZERO,
    };

    pub fn new(normal: FreeVector, coefficient: PowerCoefficient) -> Self {
        Self { normal, coefficient }
    }

    /// Merge two distortions: coefficient-weighted average of the normals, strongest coefficient.
    pub fn merge(self, other: Distortion) -> Distortion {
        Distortion {
            normal: (self.normal * self.coefficient.linear() + other.normal * other.coefficient.linear()).normalized(),
            coefficient: if other.coefficient > self.coefficient {
                other.coefficient
            } else {
                self.coefficient
            },
        }
    }

    /// Whether a ray can bounce off this distortion.
    pub fn reflects(&self) -> bool {
        self.coefficient.linear() > 0.0 && self.normal != FreeVector::ZERO
    }
}

/// Anything that interacts with radio waves inside the simulated surface.
pub trait Obstacle: Send + Sync {
    fn inside(&self, position: Point) -> bool;

    /// Whether the straight segment `begin → end` stays clear of this obstacle.
    fn in_sight(&self, begin: Point, end: Point) -> bool;

    /// Average absorption over `begin → end`, expressed per meter of the whole segment.
    fn absorption(&self, begin: Point, end: Point, frequency: Frequency) -> AbsorptionCoefficient;

    /// Merged reflective surfaces crossed by `begin → end` that face the travel direction.
    fn distortion(&self, begin: Point, end: Point, frequency: Frequency) -> Distortion;
}

/// Obstacle made of a single material throughout its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformObstacle {
    shape: Shape,
    material: Material,
}

impl UniformObstacle {
    pub fn new(shape: impl Into<Shape>, material: Material) -> Self {
        Self {
            shape: shape.into(),
            material,
        }
    }
}

impl Obstacle for UniformObstacle {
    fn inside(&self, position: Point) -> bool {
        self.shape.contains(position)
    }

    fn in_sight(&self, begin: Point, end: Point) -> bool {
        if self.shape.contains(begin) {
            return false;
        }
        !self.shape.intersections(&Ray::between(begin, end)).iter().any(|i| i.in_range)
    }

    /// Integrates the material over the inside fraction of the segment.
    ///
    /// Starting from the material alpha if `begin` is inside, every entering crossing at fraction `t`
    /// adds `alpha * (1 - t)` and every leaving crossing subtracts it. Raising the result over the
    /// segment length therefore gives `exp(-alpha * length_inside)`.
    fn absorption(&self, begin: Point, end: Point, frequency: Frequency) -> AbsorptionCoefficient {
        let material = self.material.absorption(frequency);
        let ray = Ray::between(begin, end);

        let mut coefficient = if self.shape.contains(begin) {
            material
        } else {
            AbsorptionCoefficient::NONE
        };

        for intersection in self.shape.intersections(&ray) {
            if !intersection.in_range || intersection.distance <= 0.0 {
                continue;
            }
            let remaining = material * (1.0 - intersection.fraction(&ray));
            if intersection.normal.dot(ray.vector) < 0.0 {
                coefficient = coefficient + remaining;
            } else {
                coefficient = coefficient - remaining;
            }
        }

        coefficient.clamped()
    }

    fn distortion(&self, begin: Point, end: Point, frequency: Frequency) -> Distortion {
        let reflection = self.material.reflection(frequency);
        let ray = Ray::between(begin, end);

        self.shape
            .intersections(&ray)
            .into_iter()
            .filter(|i| i.in_range && i.normal.dot(ray.vector) < 0.0)
            .fold(Distortion::NONE, |merged, i| merged.merge(Distortion::new(i.normal, reflection)))
    }
}
