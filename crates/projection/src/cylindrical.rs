//! Cylindrical projections on a sphere.

use crate::mapping::MappingParameters;
use crate::MapProjection;
use cube_common::{CubeError, Result};

/// `x = R (lon - lon0)`, `y = R lat` with angles in radians.
#[derive(Debug, Clone)]
pub struct SimpleCylindrical {
    params: MappingParameters,
}

impl SimpleCylindrical {
    pub fn new(params: MappingParameters) -> Self {
        Self { params }
    }
}

impl MapProjection for SimpleCylindrical {
    fn name(&self) -> &'static str {
        "SimpleCylindrical"
    }

    fn parameters(&self) -> &MappingParameters {
        &self.params
    }

    fn set_ground(&self, lat: f64, lon: f64) -> Option<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        let r = self.params.radius;
        Some((
            r * (lon - self.params.center_longitude).to_radians(),
            r * lat.to_radians(),
        ))
    }

    fn set_coordinate(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let r = self.params.radius;
        let lat = (y / r).to_degrees();
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        let lon = self.params.center_longitude + (x / r).to_degrees();
        Some((lat, self.params.domain.normalize(lon)))
    }
}

/// Like [`SimpleCylindrical`] with longitudes scaled by the cosine of the
/// center latitude.
#[derive(Debug, Clone)]
pub struct Equirectangular {
    params: MappingParameters,
    cos_center: f64,
}

impl Equirectangular {
    pub fn new(params: MappingParameters) -> Result<Self> {
        let cos_center = params.center_latitude.to_radians().cos();
        if cos_center <= 1e-10 {
            return Err(CubeError::user("Equirectangular CenterLatitude cannot be a pole"));
        }
        Ok(Self { params, cos_center })
    }
}

impl MapProjection for Equirectangular {
    fn name(&self) -> &'static str {
        "Equirectangular"
    }

    fn parameters(&self) -> &MappingParameters {
        &self.params
    }

    fn set_ground(&self, lat: f64, lon: f64) -> Option<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        let r = self.params.radius;
        Some((
            r * (lon - self.params.center_longitude).to_radians() * self.cos_center,
            r * lat.to_radians(),
        ))
    }

    fn set_coordinate(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let r = self.params.radius;
        let lat = (y / r).to_degrees();
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        let lon = self.params.center_longitude + (x / (r * self.cos_center)).to_degrees();
        Some((lat, self.params.domain.normalize(lon)))
    }
}
