//! Lambert Conformal Conic projection on a sphere.
//!
//! The cone is tangent (one standard parallel) or secant (two) to the
//! body. The projection origin is the mapping group's center latitude and
//! longitude.

use crate::mapping::MappingParameters;
use crate::MapProjection;
use cube_common::{CubeError, Result};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

#[derive(Debug, Clone)]
pub struct LambertConformal {
    params: MappingParameters,
    /// Cone constant
    n: f64,
    /// F constant
    f: f64,
    /// Rho at the center latitude
    rho0: f64,
}

impl LambertConformal {
    /// Parallels in degrees.
    pub fn new(params: MappingParameters, parallel1: f64, parallel2: f64) -> Result<Self> {
        let p1 = parallel1.to_radians();
        let p2 = parallel2.to_radians();
        if p1.abs() >= FRAC_PI_2 || p2.abs() >= FRAC_PI_2 {
            return Err(CubeError::user("Lambert standard parallels cannot be poles"));
        }

        let n = if (p1 - p2).abs() < 1e-10 {
            p1.sin()
        } else {
            let ln_ratio = (p1.cos() / p2.cos()).ln();
            let tan_ratio = ((FRAC_PI_4 + p2 / 2.0).tan() / (FRAC_PI_4 + p1 / 2.0).tan()).ln();
            ln_ratio / tan_ratio
        };
        if n.abs() < 1e-10 {
            return Err(CubeError::user("Lambert standard parallels cannot straddle the equator symmetrically"));
        }

        let f = p1.cos() * (FRAC_PI_4 + p1 / 2.0).tan().powf(n) / n;
        let lat0 = params.center_latitude.to_radians();
        let rho0 = params.radius * f / (FRAC_PI_4 + lat0 / 2.0).tan().powf(n);
        if !rho0.is_finite() {
            return Err(CubeError::user("Lambert CenterLatitude lies at the cone's undefined pole"));
        }
        Ok(Self { params, n, f, rho0 })
    }

    fn rho(&self, lat: f64) -> Option<f64> {
        let t = (FRAC_PI_4 + lat / 2.0).tan();
        let rho = self.params.radius * self.f / t.powf(self.n);
        rho.is_finite().then_some(rho)
    }
}

impl MapProjection for LambertConformal {
    fn name(&self) -> &'static str {
        "LambertConformal"
    }

    fn parameters(&self) -> &MappingParameters {
        &self.params
    }

    fn set_ground(&self, lat: f64, lon: f64) -> Option<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        let rho = self.rho(lat.to_radians())?;
        // Longitude difference normalized to [-180, 180)
        let dlon = ((lon - self.params.center_longitude + 180.0).rem_euclid(360.0) - 180.0).to_radians();
        let theta = self.n * dlon;
        Some((rho * theta.sin(), self.rho0 - rho * theta.cos()))
    }

    fn set_coordinate(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let sign = self.n.signum();
        let dy = self.rho0 - y;
        let rho = sign * (x * x + dy * dy).sqrt();
        let theta = (sign * x).atan2(sign * dy);
        let lat = if rho == 0.0 {
            sign * FRAC_PI_2
        } else {
            2.0 * (self.params.radius * self.f / rho).powf(1.0 / self.n).atan() - FRAC_PI_2
        };
        if !lat.is_finite() {
            return None;
        }
        let lon = self.params.center_longitude + (theta / self.n).to_degrees();
        Some((lat.to_degrees(), self.params.domain.normalize(lon)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mars() -> LambertConformal {
        let params = MappingParameters::new(3_396_190.0).with_center(40.0, 100.0);
        LambertConformal::new(params, 30.0, 50.0).unwrap()
    }

    #[test]
    fn test_center_maps_to_origin() {
        let (x, y) = mars().set_ground(40.0, 100.0).unwrap();
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6);
    }

    #[test]
    fn test_round_trip() {
        let proj = mars();
        for (lat, lon) in [(35.0, 90.0), (55.0, 120.0), (10.0, 100.0), (60.0, 80.5)] {
            let (x, y) = proj.set_ground(lat, lon).unwrap();
            let (lat2, lon2) = proj.set_coordinate(x, y).unwrap();
            assert!((lat - lat2).abs() < 1e-9, "lat {lat} -> {lat2}");
            assert!((lon - lon2).abs() < 1e-9, "lon {lon} -> {lon2}");
        }
    }

    #[test]
    fn test_opposite_pole_undefined() {
        assert!(mars().set_ground(-90.0, 0.0).is_none());
    }
}
