//! Body-fixed vector helpers.
//!
//! Latitudes are planetocentric degrees, longitudes positive east in
//! degrees.

use cube_common::{CubeError, Result};
use nalgebra::Vector3;

pub type Vec3 = Vector3<f64>;

/// Build a 3-vector from a slice, rejecting any other length.
pub fn to_vector(values: &[f64]) -> Result<Vec3> {
    match values {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(CubeError::bad_argument(format!(
            "expected a 3-vector, got {} components",
            values.len()
        ))),
    }
}

/// Unit vector pointing at (lat, lon).
pub fn lat_lon_to_direction(lat: f64, lon: f64) -> Vec3 {
    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    Vec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

/// Planetocentric (lat, lon) of a vector; longitude in [0, 360).
pub fn direction_to_lat_lon(v: &Vec3) -> (f64, f64) {
    let r = v.norm();
    if r == 0.0 {
        return (0.0, 0.0);
    }
    let lat = (v.z / r).clamp(-1.0, 1.0).asin().to_degrees();
    let mut lon = v.y.atan2(v.x).to_degrees();
    if lon < 0.0 {
        lon += 360.0;
    }
    (lat, lon)
}

/// Angle between two vectors in radians; zero vectors give zero.
pub fn separation(a: &Vec3, b: &Vec3) -> f64 {
    let (na, nb) = (a.norm(), b.norm());
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (a.dot(b) / (na * nb)).clamp(-1.0, 1.0).acos()
}
