//! The camera contract.

use crate::distortion::DistortionMap;
use cube_common::Result;

/// Photometric angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotometricAngles {
    pub phase: f64,
    pub incidence: f64,
    pub emission: f64,
    /// Whether the local surface normal was available.
    pub valid: bool,
}

/// A sensor model mapping image pixels to ground points and back.
///
/// A camera is a mutable cursor: `set_image` or `set_ground` positions it
/// and the accessors describe that position. Accessors fail with a
/// `Camera` error when the cursor has no valid ground point.
pub trait Camera: Send {
    /// Position on a 1-based (sample, line). Returns whether the pixel sees
    /// the surface.
    fn set_image(&mut self, sample: f64, line: f64) -> Result<bool>;

    /// Position on a ground point in degrees. Returns whether the point
    /// images into the sensor.
    fn set_ground(&mut self, lat: f64, lon: f64) -> Result<bool>;

    fn set_band(&mut self, band: usize) -> Result<()>;

    fn band(&self) -> usize;

    fn samples(&self) -> usize;

    fn lines(&self) -> usize;

    /// Image coordinate of the cursor as (sample, line).
    fn image_position(&self) -> Result<(f64, f64)>;

    fn universal_latitude(&self) -> Result<f64>;

    fn universal_longitude(&self) -> Result<f64>;

    /// Radius of the surface point in kilometres.
    fn local_radius(&self) -> Result<f64>;

    fn phase_angle(&self) -> Result<f64>;

    fn incidence_angle(&self) -> Result<f64>;

    fn emission_angle(&self) -> Result<f64>;

    /// Ground size of a pixel in metres.
    fn pixel_resolution(&self) -> Result<f64>;

    /// Angles relative to the local surface normal.
    fn local_photometric_angles(&self) -> Result<PhotometricAngles>;

    /// Detector pixel pitch in millimetres.
    fn pixel_pitch(&self) -> f64;

    fn distortion_map(&self) -> &dyn DistortionMap;
}
