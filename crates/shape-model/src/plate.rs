//! A single triangular plate and the ray/plate intersection test.

use crate::geometry::{separation, Vec3};
use crate::tolerance::Tolerance;

/// A triangle of the body surface, identified by its 1-based plate id.
///
/// Vertices are stored by value; a plate never points into the kernel's
/// vertex array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangularPlate {
    pub id: usize,
    pub vertices: [Vec3; 3],
}

impl TriangularPlate {
    pub fn new(id: usize, v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self {
            id,
            vertices: [v0, v1, v2],
        }
    }

    /// Outward normal, unnormalized: `(V1 - V0) x (V2 - V0)`.
    pub fn raw_normal(&self) -> Vec3 {
        let [v0, v1, v2] = &self.vertices;
        (v1 - v0).cross(&(v2 - v0))
    }

    /// Unit normal, or the zero vector for a degenerate plate.
    pub fn normal(&self) -> Vec3 {
        self.raw_normal().try_normalize(0.0).unwrap_or_else(Vec3::zeros)
    }

    pub fn area(&self) -> f64 {
        0.5 * self.raw_normal().norm()
    }

    pub fn centroid(&self) -> Vec3 {
        let [v0, v1, v2] = &self.vertices;
        (v0 + v1 + v2) / 3.0
    }

    pub fn min_radius(&self) -> f64 {
        self.vertices.iter().map(|v| v.norm()).fold(f64::INFINITY, f64::min)
    }

    pub fn max_radius(&self) -> f64 {
        self.vertices.iter().map(|v| v.norm()).fold(0.0, f64::max)
    }

    /// Angle in radians between the plate normal and a direction.
    pub fn separation_angle(&self, direction: &Vec3) -> f64 {
        separation(&self.normal(), direction)
    }

    /// Intersect the ray `observer + t * look` with the plate.
    ///
    /// With `E1 = V0 - O`, `E2 = V1 - O`, `E3 = V2 - O` the ray passes
    /// through the plate when the triple products `D.(E1xE2)`, `D.(E2xE3)`,
    /// `D.(E3xE1)` share the sign of `en = E3.(E1xE2)` (zeros allowed). The
    /// observer must also be on the outward side of the plate (`en < 0`),
    /// and sign agreement then guarantees `t >= 0`.
    pub fn intercept(&self, observer: &Vec3, look: &Vec3, tol: &Tolerance) -> Option<Vec3> {
        self.intercept_distance(observer, look, tol)
            .map(|t| observer + look * t)
    }

    /// Ray parameter `t` of the hit, if any.
    pub fn intercept_distance(&self, observer: &Vec3, look: &Vec3, tol: &Tolerance) -> Option<f64> {
        let [v0, v1, v2] = &self.vertices;
        let e1 = v0 - observer;
        let e2 = v1 - observer;
        let e3 = v2 - observer;

        let c12 = e1.cross(&e2);
        let en = e3.dot(&c12);
        let volume_scale = e1.norm() * e2.norm() * e3.norm();
        if tol.sign(en, volume_scale) >= 0 {
            return None;
        }

        let look_norm = look.norm();
        let d12 = look.dot(&c12);
        let d23 = look.dot(&e2.cross(&e3));
        let d31 = look.dot(&e3.cross(&e1));
        let consistent = [(d12, &e1, &e2), (d23, &e2, &e3), (d31, &e3, &e1)]
            .iter()
            .all(|(d, a, b)| tol.sign(*d, look_norm * a.norm() * b.norm()) <= 0);
        if !consistent {
            return None;
        }

        let denom = d12 + d23 + d31;
        if tol.is_zero(denom, look_norm * volume_scale.cbrt().powi(2)) {
            return None;
        }
        Some(en / denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_plate() -> TriangularPlate {
        TriangularPlate::new(
            1,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        )
    }

    #[test]
    fn test_hit_from_outside() {
        let plate = unit_plate();
        let tol = Tolerance::default();
        let observer = Vec3::new(1000.0, 0.0, 0.0);
        let look = Vec3::new(-1.0, 0.0, 0.0);
        let point = plate.intercept(&observer, &look, &tol).unwrap();
        assert!((point - Vec3::new(1.0, 0.0, 0.0)).norm() < 1e-10);

        let emission = separation(&plate.normal(), &(observer - point));
        assert!((emission - (1.0 / 3f64.sqrt()).acos()).abs() < 1e-12);
    }

    #[test]
    fn test_miss_from_inside() {
        let plate = unit_plate();
        let hit = plate.intercept(&Vec3::zeros(), &Vec3::new(1.0, 1.0, 1.0), &Tolerance::default());
        assert!(hit.is_none());
    }

    #[test]
    fn test_pointing_away_misses() {
        let plate = unit_plate();
        let observer = Vec3::new(10.0, 10.0, 10.0);
        assert!(plate
            .intercept(&observer, &Vec3::new(1.0, 1.0, 1.0), &Tolerance::default())
            .is_none());
    }

    #[test]
    fn test_parallel_ray_misses() {
        let plate = unit_plate();
        // Observer in the plate's plane.
        let observer = Vec3::new(2.0, -1.0, 0.0);
        let look = Vec3::new(-1.0, 1.0, 0.0);
        assert!(plate.intercept(&observer, &look, &Tolerance::default()).is_none());
    }

    #[test]
    fn test_outside_triangle_misses() {
        let plate = unit_plate();
        let observer = Vec3::new(10.0, 10.0, 10.0);
        // Aim at (2, -1, 0), which is in the plane but outside the triangle.
        let look = Vec3::new(2.0, -1.0, 0.0) - observer;
        assert!(plate.intercept(&observer, &look, &Tolerance::default()).is_none());
    }

    #[test]
    fn test_vertex_hit_counts() {
        let plate = unit_plate();
        let observer = Vec3::new(0.0, 5.0, 0.0);
        let look = Vec3::new(0.0, -1.0, 0.0);
        let point = plate.intercept(&observer, &look, &Tolerance::default()).unwrap();
        assert!((point - Vec3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_radii_and_area() {
        let plate = unit_plate();
        assert!((plate.min_radius() - 1.0).abs() < 1e-15);
        assert!((plate.max_radius() - 1.0).abs() < 1e-15);
        assert!((plate.area() - 3f64.sqrt() / 2.0).abs() < 1e-12);
        let n = plate.normal();
        assert!((n - Vec3::new(1.0, 1.0, 1.0) / 3f64.sqrt()).norm() < 1e-12);
    }
}
