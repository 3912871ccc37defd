//! Triaxial ellipsoid surface.

use crate::geometry::{lat_lon_to_direction, Vec3};
use crate::shape::{ShapeModel, SurfaceHit};
use cube_common::{CubeError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipsoidShape {
    pub radii: [f64; 3],
}

impl EllipsoidShape {
    pub fn new(a: f64, b: f64, c: f64) -> Result<Self> {
        if [a, b, c].iter().any(|r| !(r.is_finite() && *r > 0.0)) {
            return Err(CubeError::bad_argument(format!(
                "ellipsoid radii ({a}, {b}, {c}) must be positive"
            )));
        }
        Ok(Self { radii: [a, b, c] })
    }

    pub fn sphere(r: f64) -> Result<Self> {
        Self::new(r, r, r)
    }

    fn scale(&self, v: &Vec3) -> Vec3 {
        Vec3::new(v.x / self.radii[0], v.y / self.radii[1], v.z / self.radii[2])
    }

    /// Outward unit normal at a surface point.
    pub fn normal_at(&self, p: &Vec3) -> Vec3 {
        let [a, b, c] = self.radii;
        Vec3::new(p.x / (a * a), p.y / (b * b), p.z / (c * c))
            .try_normalize(0.0)
            .unwrap_or_else(Vec3::zeros)
    }
}

impl ShapeModel for EllipsoidShape {
    fn name(&self) -> &str {
        "Ellipsoid"
    }

    fn intersect(&self, observer: &Vec3, look: &Vec3) -> Result<Option<SurfaceHit>> {
        if look.norm() == 0.0 {
            return Err(CubeError::bad_argument("look direction must be non-zero"));
        }
        // Solve |S(o + t d)|^2 = 1 in the unit-sphere frame.
        let o = self.scale(observer);
        let d = self.scale(look);
        let a = d.dot(&d);
        let b = 2.0 * o.dot(&d);
        let c = o.dot(&o) - 1.0;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return Ok(None);
        }
        let root = disc.sqrt();
        let t = [(-b - root) / (2.0 * a), (-b + root) / (2.0 * a)]
            .into_iter()
            .find(|t| *t >= 0.0);
        Ok(t.map(|t| {
            let point = observer + look * t;
            SurfaceHit {
                point,
                normal: self.normal_at(&point),
                plate_id: None,
            }
        }))
    }

    fn surface_point(&self, lat: f64, lon: f64) -> Result<Option<Vec3>> {
        let u = lat_lon_to_direction(lat, lon);
        let r = 1.0 / self.scale(&u).norm();
        Ok(Some(u * r))
    }

    fn max_radius(&self) -> Result<f64> {
        Ok(self.radii.iter().copied().fold(0.0, f64::max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_intersection() {
        let sphere = EllipsoidShape::sphere(10.0).unwrap();
        let hit = sphere
            .intersect(&Vec3::new(100.0, 0.0, 0.0), &Vec3::new(-1.0, 0.0, 0.0))
            .unwrap()
            .unwrap();
        assert!((hit.point - Vec3::new(10.0, 0.0, 0.0)).norm() < 1e-9);
        assert!((hit.normal - Vec3::x()).norm() < 1e-12);
        assert!(sphere
            .intersect(&Vec3::new(100.0, 20.0, 0.0), &Vec3::new(-1.0, 0.0, 0.0))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_triaxial_radius() {
        let body = EllipsoidShape::new(3.0, 2.0, 1.0).unwrap();
        assert!((body.local_radius(0.0, 0.0).unwrap().unwrap() - 3.0).abs() < 1e-12);
        assert!((body.local_radius(0.0, 90.0).unwrap().unwrap() - 2.0).abs() < 1e-12);
        assert!((body.local_radius(90.0, 0.0).unwrap().unwrap() - 1.0).abs() < 1e-12);
        assert!(EllipsoidShape::new(1.0, 0.0, 1.0).is_err());
    }
}
