//! Continuous 2D geometry for obstacle shapes.
//!
//! Contains helpers for:
//! - Points and free vectors (normalization, reflection about a normal)
//! - Ray/segment versus wall-line intersection with degenerate-case rejection
//! - Polygon containment by odd-parity counting against a fixed probe ray
//! - Constructive solid geometry: the difference of two shapes
//!
//! Every [`Intersection`] normal points out of the material, i.e. towards the side a ray comes from
//! when it enters the shape. Polygons are normalized to counter-clockwise order so that the edge normal
//! `(dy, -dx)` satisfies this for every edge.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};
use thiserror::Error;

/// Angle of the containment probe ray. Not axis aligned, so grid-aligned walls never produce
/// grazing hits along the probe.
const PROBE_ANGLE: f64 = 0.123;

/// Determinants below this magnitude are treated as parallel lines.
const PARALLEL_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("polygon vertex {0} has a non-finite coordinate")]
    NonFiniteVertex(usize),
    #[error("wall from ({0}, {1}) to ({2}, {3}) has zero length")]
    ZeroLengthWall(f64, f64, f64, f64),
    #[error("wall thickness must be positive, got {0}")]
    InvalidThickness(f64),
}

/// Simple 2D point in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        FreeVector::between(*self, other).length()
    }
}

impl Add<FreeVector> for Point {
    type Output = Point;

    fn add(self, v: FreeVector) -> Point {
        Point::new(self.x + v.dx, self.y + v.dy)
    }
}

/// Direction/displacement vector, not anchored anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FreeVector {
    pub dx: f64,
    pub dy: f64,
}

impl FreeVector {
    pub const ZERO: FreeVector = FreeVector { dx: 0.0, dy: 0.0 };

    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Vector pointing from `a` to `b`.
    pub fn between(a: Point, b: Point) -> Self {
        Self::new(b.x - a.x, b.y - a.y)
    }

    /// Unit vector at `angle` radians measured from the +y axis towards +x.
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.sin(), angle.cos())
    }

    pub fn length(&self) -> f64 {
        self.dx.hypot(self.dy)
    }

    /// Unit vector with the same direction. The zero vector stays zero.
    pub fn normalized(&self) -> Self {
        let length = self.length();
        if length == 0.0 {
            return FreeVector::ZERO;
        }
        Self::new(self.dx / length, self.dy / length)
    }

    /// Rotated a quarter turn clockwise.
    pub fn transposed(&self) -> Self {
        Self::new(self.dy, -self.dx)
    }

    pub fn dot(&self, other: FreeVector) -> f64 {
        self.dx * other.dx + self.dy * other.dy
    }

    /// Specular reflection about the line whose normal is `normal` (any length).
    pub fn reflected_by(&self, normal: FreeVector) -> Self {
        let n = normal.normalized();
        *self - n * (2.0 * self.dot(n))
    }
}

impl Add for FreeVector {
    type Output = FreeVector;

    fn add(self, v: FreeVector) -> FreeVector {
        FreeVector::new(self.dx + v.dx, self.dy + v.dy)
    }
}

impl Sub for FreeVector {
    type Output = FreeVector;

    fn sub(self, v: FreeVector) -> FreeVector {
        FreeVector::new(self.dx - v.dx, self.dy - v.dy)
    }
}

impl Neg for FreeVector {
    type Output = FreeVector;

    fn neg(self) -> FreeVector {
        FreeVector::new(-self.dx, -self.dy)
    }
}

impl Mul<f64> for FreeVector {
    type Output = FreeVector;

    fn mul(self, by: f64) -> FreeVector {
        FreeVector::new(self.dx * by, self.dy * by)
    }
}

/// A point plus a free vector. Used both as a half-line (any `t >= 0`) and as the finite segment
/// `origin → origin + vector` (`0 <= t <= 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point,
    pub vector: FreeVector,
}

impl Ray {
    pub fn new(origin: Point, vector: FreeVector) -> Self {
        Self { origin, vector }
    }

    /// Segment from `a` to `b`.
    pub fn between(a: Point, b: Point) -> Self {
        Self::new(a, FreeVector::between(a, b))
    }
}

/// Wall line between two polygon vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub a: Point,
    pub b: Point,
}

impl Line {
    pub fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    pub fn normal(&self) -> FreeVector {
        FreeVector::between(self.a, self.b).transposed().normalized()
    }
}

/// Crossing of a ray with a shape boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    pub position: Point,
    /// Unit normal pointing out of the material.
    pub normal: FreeVector,
    /// Distance from the ray origin, `|vector| * t`.
    pub distance: f64,
    /// Whether the crossing lies on the finite segment (`t <= 1`).
    pub in_range: bool,
}

impl Intersection {
    /// Parametric position along the ray, `distance / |vector|`.
    pub fn fraction(&self, ray: &Ray) -> f64 {
        self.distance / ray.vector.length()
    }
}

impl Neg for Intersection {
    type Output = Intersection;

    fn neg(self) -> Intersection {
        Intersection {
            normal: -self.normal,
            ..self
        }
    }
}

/// Intersect a wall line with a ray.
///
/// # Returns
///
/// `None` when the lines are parallel (including zero-length wall or ray), when the hit is behind the
/// ray origin (`t < 0`), or when it falls outside the wall segment.
pub fn intersect(wall: &Line, ray: &Ray) -> Option<Intersection> {
    let (x1, y1, x2, y2) = (wall.a.x, wall.a.y, wall.b.x, wall.b.y);
    let dx = x2 - x1;
    let dy = y2 - y1;
    let dxp = ray.vector.dx;
    let dyp = ray.vector.dy;

    let divider = dyp * dx - dxp * dy;
    if divider.abs() < PARALLEL_EPSILON {
        return None;
    }

    let t = ((ray.origin.x - x1) * dy - (ray.origin.y - y1) * dx) / divider;
    if t < 0.0 {
        return None;
    }

    let x = ray.origin.x + dxp * t;
    let y = ray.origin.y + dyp * t;

    // Check along the wall's dominant axis; the other axis is implied by the line equation
    let within_wall = if dx.abs() > dy.abs() {
        x >= x1.min(x2) && x <= x1.max(x2)
    } else {
        y >= y1.min(y2) && y <= y1.max(y2)
    };
    if !within_wall {
        return None;
    }

    Some(Intersection {
        position: Point::new(x, y),
        normal: wall.normal(),
        distance: ray.vector.length() * t,
        in_range: t <= 1.0,
    })
}

/// Axis-aligned rectangle given by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub min: Point,
    pub max: Point,
}

impl Rectangle {
    /// Rectangle spanned by two arbitrary opposite corners.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rectangle) -> Rectangle {
        Rectangle {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

/// Closed polygon with counter-clockwise vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<Point>,
    bounds: Rectangle,
}

impl Polygon {
    /// Build a polygon from its vertices in either winding order.
    pub fn new(mut points: Vec<Point>) -> Result<Self, GeometryError> {
        if points.len() < 3 {
            return Err(GeometryError::TooFewVertices(points.len()));
        }
        if let Some(idx) = points.iter().position(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(GeometryError::NonFiniteVertex(idx));
        }

        if signed_area(&points) < 0.0 {
            points.reverse();
        }

        let mut bounds = Rectangle::from_corners(points[0], points[0]);
        for p in &points[1..] {
            bounds = bounds.union(&Rectangle::from_corners(*p, *p));
        }

        Ok(Self { points, bounds })
    }

    /// Axis-aligned rectangle between two opposite corners.
    pub fn rectangle(a: Point, b: Point) -> Self {
        let r = Rectangle::from_corners(a, b);
        Self {
            points: vec![r.min, Point::new(r.max.x, r.min.y), r.max, Point::new(r.min.x, r.max.y)],
            bounds: r,
        }
    }

    /// Straight wall of the given thickness centered on the segment `from → to`.
    pub fn wall(from: Point, to: Point, thickness: f64) -> Result<Self, GeometryError> {
        if !(thickness > 0.0) {
            return Err(GeometryError::InvalidThickness(thickness));
        }
        let along = FreeVector::between(from, to);
        if along.length() == 0.0 {
            return Err(GeometryError::ZeroLengthWall(from.x, from.y, to.x, to.y));
        }
        let half = along.transposed().normalized() * (thickness / 2.0);
        Self::new(vec![from + half, to + half, to + -half, from + -half])
    }

    pub fn bounds(&self) -> Rectangle {
        self.bounds
    }

    fn edges(&self) -> impl Iterator<Item = Line> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| Line::new(self.points[i], self.points[(i + 1) % n]))
    }

    pub fn contains(&self, point: Point) -> bool {
        if !self.bounds.contains(point) {
            return false;
        }
        let probe = Ray::new(point, FreeVector::from_angle(PROBE_ANGLE));
        let crossings = self
            .edges()
            .filter_map(|edge| intersect(&edge, &probe))
            .filter(|intersection| intersection.distance > 0.0)
            .count();
        crossings % 2 == 1
    }

    pub fn intersections(&self, ray: &Ray) -> Vec<Intersection> {
        self.edges().filter_map(|edge| intersect(&edge, ray)).collect()
    }
}

/// Shoelace formula; positive for counter-clockwise vertices.
fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let a = points[i];
            let b = points[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

/// Solid obstacle shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polygon(Polygon),
    /// Points of the first shape that are not inside the second one.
    Difference(Box<Shape>, Box<Shape>),
}

impl From<Polygon> for Shape {
    fn from(polygon: Polygon) -> Self {
        Shape::Polygon(polygon)
    }
}

impl Shape {
    pub fn difference(exterior: impl Into<Shape>, interior: impl Into<Shape>) -> Self {
        Shape::Difference(Box::new(exterior.into()), Box::new(interior.into()))
    }

    pub fn contains(&self, point: Point) -> bool {
        match self {
            Shape::Polygon(polygon) => polygon.contains(point),
            Shape::Difference(a, b) => a.contains(point) && !b.contains(point),
        }
    }

    /// All boundary crossings of the (half-line) ray, in no particular order.
    pub fn intersections(&self, ray: &Ray) -> Vec<Intersection> {
        match self {
            Shape::Polygon(polygon) => polygon.intersections(ray),
            Shape::Difference(a, b) => {
                let from_a = a.intersections(ray);
                let from_b = b.intersections(ray);
                let mut intersections = Vec::with_capacity(from_a.len() + from_b.len());

                intersections.extend(from_a.into_iter().filter(|i| !b.contains(i.position)));
                // Inside the cut the material lies on the other side of B's boundary
                intersections.extend(from_b.into_iter().filter(|i| a.contains(i.position)).map(|i| -i));

                intersections
            }
        }
    }

    /// Bounding rectangle of the material.
    pub fn bounds(&self) -> Rectangle {
        match self {
            Shape::Polygon(polygon) => polygon.bounds(),
            Shape::Difference(a, _) => a.bounds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn annulus() -> Shape {
        Shape::difference(Polygon::rectangle(p(0.0, 0.0), p(10.0, 10.0)), Polygon::rectangle(p(2.0, 2.0), p(8.0, 8.0)))
    }

    #[test]
    fn intersect_crossing_segments() {
        let wall = Line::new(p(5.0, 0.0), p(5.0, 10.0));
        let hit = intersect(&wall, &Ray::between(p(0.0, 5.0), p(10.0, 5.0))).unwrap();
        assert!((hit.position.x - 5.0).abs() < 1e-12 && (hit.position.y - 5.0).abs() < 1e-12);
        assert!((hit.distance - 5.0).abs() < 1e-12);
        assert!(hit.in_range);

        // Beyond the segment end, but still on the half-line
        let far = intersect(&wall, &Ray::between(p(0.0, 5.0), p(2.0, 5.0))).unwrap();
        assert!(!far.in_range);

        // Behind the origin
        assert!(intersect(&wall, &Ray::between(p(6.0, 5.0), p(10.0, 5.0))).is_none());
        // Misses the wall segment
        assert!(intersect(&wall, &Ray::between(p(0.0, 15.0), p(10.0, 15.0))).is_none());
    }

    #[test]
    fn intersect_rejects_degenerate_cases() {
        let wall = Line::new(p(0.0, 0.0), p(10.0, 0.0));
        // Parallel
        assert!(intersect(&wall, &Ray::between(p(0.0, 1.0), p(10.0, 1.0))).is_none());
        // Zero-length wall
        let point_wall = Line::new(p(3.0, 3.0), p(3.0, 3.0));
        assert!(intersect(&point_wall, &Ray::between(p(0.0, 0.0), p(10.0, 10.0))).is_none());
        // Zero-length ray
        assert!(intersect(&wall, &Ray::between(p(5.0, 5.0), p(5.0, 5.0))).is_none());
    }

    #[test]
    fn vector_reflection_and_normalization() {
        let v = FreeVector::new(1.0, -1.0);
        let r = v.reflected_by(FreeVector::new(0.0, 3.0));
        assert_eq!(r, FreeVector::new(1.0, 1.0));
        assert_eq!(FreeVector::ZERO.normalized(), FreeVector::ZERO);
        assert!((FreeVector::new(3.0, 4.0).normalized().length() - 1.0).abs() < 1e-12);
        assert_eq!(FreeVector::new(1.0, 0.0).transposed(), FreeVector::new(0.0, -1.0));
    }

    #[test]
    fn polygon_contains_and_bounds() {
        let square = Polygon::rectangle(p(0.0, 0.0), p(10.0, 10.0));
        assert!(square.contains(p(5.0, 5.0)));
        assert!(square.contains(p(0.5, 9.5)));
        assert!(!square.contains(p(11.0, 5.0)));
        assert!(!square.contains(p(-0.1, 5.0)));

        let triangle = Polygon::new(vec![p(0.0, 0.0), p(4.0, 0.0), p(0.0, 4.0)]).unwrap();
        assert!(triangle.contains(p(1.0, 1.0)));
        assert!(!triangle.contains(p(3.0, 3.0)));
        assert_eq!(triangle.bounds(), Rectangle::from_corners(p(0.0, 0.0), p(4.0, 4.0)));
    }

    #[test]
    fn polygon_rejects_bad_input() {
        assert_eq!(Polygon::new(vec![p(0.0, 0.0), p(1.0, 0.0)]), Err(GeometryError::TooFewVertices(2)));
        assert_eq!(
            Polygon::new(vec![p(0.0, 0.0), p(f64::NAN, 0.0), p(0.0, 1.0)]),
            Err(GeometryError::NonFiniteVertex(1))
        );
        assert!(Polygon::wall(p(1.0, 1.0), p(1.0, 1.0), 0.2).is_err());
        assert!(Polygon::wall(p(0.0, 0.0), p(1.0, 0.0), 0.0).is_err());
    }

    #[test]
    fn clockwise_polygon_normals_point_outwards() {
        let cw = Polygon::new(vec![p(0.0, 0.0), p(0.0, 4.0), p(4.0, 4.0), p(4.0, 0.0)]).unwrap();
        let ray = Ray::between(p(-1.0, 2.0), p(5.0, 2.0));
        let mut hits = cw.intersections(&ray);
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        assert_eq!(hits.len(), 2);
        // Entering crossing faces the ray, leaving crossing faces away
        assert!(hits[0].normal.dot(ray.vector) < 0.0);
        assert!(hits[1].normal.dot(ray.vector) > 0.0);
    }

    #[test]
    fn wall_polygon_has_requested_thickness() {
        let wall = Polygon::wall(p(0.0, 1.0), p(10.0, 1.0), 0.4).unwrap();
        assert!(wall.contains(p(5.0, 1.15)));
        assert!(!wall.contains(p(5.0, 1.25)));
        assert!((wall.bounds().height() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn csg_difference_containment() {
        let shape = annulus();
        assert!(shape.contains(p(1.0, 1.0)));
        assert!(!shape.contains(p(5.0, 5.0)));
        assert!(!shape.contains(p(11.0, 11.0)));
    }

    #[test]
    fn csg_difference_containment_random_points() {
        let shape = annulus();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let q = p(rng.gen_range(-2.0..12.0), rng.gen_range(-2.0..12.0));
            let in_outer = q.x > 0.0 && q.x < 10.0 && q.y > 0.0 && q.y < 10.0;
            let in_inner = q.x > 2.0 && q.x < 8.0 && q.y > 2.0 && q.y < 8.0;
            assert_eq!(shape.contains(q), in_outer && !in_inner, "point {:?}", q);
        }
    }

    #[test]
    fn csg_difference_intersections_face_out_of_material() {
        let shape = annulus();
        let ray = Ray::between(p(-1.0, 5.0), p(11.0, 5.0));
        let mut hits = shape.intersections(&ray);
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        assert_eq!(hits.len(), 4);
        for (hit, x) in hits.iter().zip([0.0, 2.0, 8.0, 10.0]) {
            assert!((hit.position.x - x).abs() < 1e-9, "hit {:?}", hit);
        }
        // enter, leave (into the hole), enter (out of the hole), leave
        let signs: Vec<bool> = hits.iter().map(|h| h.normal.dot(ray.vector) < 0.0).collect();
        assert_eq!(signs, vec![true, false, true, false]);
    }
}
