//! Ephemeris and clock services.
//!
//! Positions are body-fixed kilometres at an ephemeris time in seconds.

use cube_common::{CubeError, Result};
use nalgebra::Matrix3;
use shape_model::Vec3;

/// Source of spacecraft and sun geometry.
pub trait EphemerisOracle: Send + Sync {
    fn spacecraft_position(&self, et: f64) -> Result<Vec3>;

    /// Rotation taking camera-frame vectors into the body-fixed frame.
    fn instrument_rotation(&self, et: f64) -> Result<Matrix3<f64>>;

    fn sun_position(&self, et: f64) -> Result<Vec3>;

    fn body_radii(&self) -> Result<[f64; 3]>;

    /// Spacecraft clock string to ephemeris seconds.
    fn clock_to_et(&self, clock: &str) -> Result<f64>;

    /// Sun to body distance in astronomical units.
    fn solar_distance_au(&self, et: f64) -> Result<f64> {
        const AU_KM: f64 = 149_597_870.7;
        Ok(self.sun_position(et)?.norm() / AU_KM)
    }
}

/// Geometry that does not change with time.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticEphemeris {
    pub spacecraft: Vec3,
    pub rotation: Matrix3<f64>,
    pub sun: Vec3,
    pub radii: [f64; 3],
    /// Seconds per clock tick.
    pub clock_rate: f64,
}

impl StaticEphemeris {
    pub fn new(spacecraft: Vec3, rotation: Matrix3<f64>, sun: Vec3, radii: [f64; 3]) -> Self {
        Self {
            spacecraft,
            rotation,
            sun,
            radii,
            clock_rate: 1.0,
        }
    }

    /// Camera at `spacecraft` with its boresight (+Z) aimed at the body
    /// center and +X roughly along body +Z projected into the image plane.
    pub fn nadir(spacecraft: Vec3, sun: Vec3, radii: [f64; 3]) -> Result<Self> {
        let boresight = (-spacecraft)
            .try_normalize(0.0)
            .ok_or_else(|| CubeError::bad_argument("spacecraft cannot be at the body center"))?;
        let reference = if boresight.cross(&Vec3::z()).norm() > 1e-6 {
            Vec3::z()
        } else {
            Vec3::x()
        };
        let x = reference - boresight * reference.dot(&boresight);
        let x = x.normalize();
        let y = boresight.cross(&x);
        let rotation = Matrix3::from_columns(&[x, y, boresight]);
        Ok(Self::new(spacecraft, rotation, sun, radii))
    }
}

impl EphemerisOracle for StaticEphemeris {
    fn spacecraft_position(&self, _et: f64) -> Result<Vec3> {
        Ok(self.spacecraft)
    }

    fn instrument_rotation(&self, _et: f64) -> Result<Matrix3<f64>> {
        Ok(self.rotation)
    }

    fn sun_position(&self, _et: f64) -> Result<Vec3> {
        Ok(self.sun)
    }

    fn body_radii(&self) -> Result<[f64; 3]> {
        Ok(self.radii)
    }

    fn clock_to_et(&self, clock: &str) -> Result<f64> {
        // Accept "partition/ticks" or bare ticks.
        let ticks = clock.rsplit('/').next().unwrap_or(clock).trim();
        ticks
            .parse::<f64>()
            .map(|t| t * self.clock_rate)
            .map_err(|_| CubeError::spice(format!("cannot convert spacecraft clock '{clock}'")))
    }
}
