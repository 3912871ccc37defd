//! Pinhole framing camera over any shape model.

use crate::camera::{Camera, PhotometricAngles};
use crate::distortion::{DistortionMap, NoDistortion};
use crate::ephemeris::EphemerisOracle;
use cube_common::{CubeError, Result};
use label::{Container, Traverse};
use shape_model::{direction_to_lat_lon, separation, ShapeModel, Vec3};
use std::sync::Arc;
use tracing::debug;

/// Fixed optical parameters of a frame camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
    pub focal_length_mm: f64,
    pub pixel_pitch_mm: f64,
    /// Boresight position in 1-based image coordinates.
    pub boresight_sample: f64,
    pub boresight_line: f64,
}

impl FrameGeometry {
    /// Centered boresight.
    pub fn new(samples: usize, lines: usize, focal_length_mm: f64, pixel_pitch_mm: f64) -> Self {
        Self {
            samples,
            lines,
            bands: 1,
            focal_length_mm,
            pixel_pitch_mm,
            boresight_sample: (samples as f64 + 1.0) / 2.0,
            boresight_line: (lines as f64 + 1.0) / 2.0,
        }
    }

    /// Read `FocalLength`, `PixelPitch` and optional `BoresightSample`/
    /// `BoresightLine` from an instrument group.
    pub fn from_group(group: &Container, samples: usize, lines: usize, bands: usize) -> Result<Self> {
        let focal = group.keyword("FocalLength", Traverse::CurrentLevel)?.as_f64(0)?;
        let pitch = group.keyword("PixelPitch", Traverse::CurrentLevel)?.as_f64(0)?;
        let mut geometry = Self::new(samples, lines, focal, pitch);
        geometry.bands = bands;
        if let Ok(k) = group.keyword("BoresightSample", Traverse::CurrentLevel) {
            geometry.boresight_sample = k.as_f64(0)?;
        }
        if let Ok(k) = group.keyword("BoresightLine", Traverse::CurrentLevel) {
            geometry.boresight_line = k.as_f64(0)?;
        }
        geometry.validate()?;
        Ok(geometry)
    }

    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 || self.lines == 0 || self.bands == 0 {
            return Err(CubeError::bad_argument("camera detector must have at least one pixel"));
        }
        if !(self.focal_length_mm > 0.0 && self.pixel_pitch_mm > 0.0) {
            return Err(CubeError::bad_argument(format!(
                "focal length {} and pixel pitch {} must be positive",
                self.focal_length_mm, self.pixel_pitch_mm
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct GroundState {
    sample: f64,
    line: f64,
    point: Vec3,
    local_normal: Vec3,
    spacecraft: Vec3,
    sun: Vec3,
}

/// A frame camera looking along +Z of its frame; +X follows increasing
/// samples and +Y increasing lines.
pub struct FramingCamera {
    geometry: FrameGeometry,
    distortion: Box<dyn DistortionMap>,
    shape: Arc<dyn ShapeModel>,
    ephemeris: Arc<dyn EphemerisOracle>,
    et: f64,
    band: usize,
    state: Option<GroundState>,
}

impl std::fmt::Debug for FramingCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramingCamera")
            .field("geometry", &self.geometry)
            .field("shape", &self.shape.name())
            .field("et", &self.et)
            .field("band", &self.band)
            .finish()
    }
}

impl FramingCamera {
    pub fn new(
        geometry: FrameGeometry,
        shape: Arc<dyn ShapeModel>,
        ephemeris: Arc<dyn EphemerisOracle>,
        et: f64,
    ) -> Result<Self> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            distortion: Box::new(NoDistortion),
            shape,
            ephemeris,
            et,
            band: 1,
            state: None,
        })
    }

    pub fn with_distortion(mut self, distortion: Box<dyn DistortionMap>) -> Self {
        self.distortion = distortion;
        self
    }

    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    pub fn set_time(&mut self, et: f64) {
        self.et = et;
        self.state = None;
    }

    fn state(&self) -> Result<&GroundState> {
        self.state
            .as_ref()
            .ok_or_else(|| CubeError::camera("camera is not positioned on the surface"))
    }

    fn to_focal_plane(&self, sample: f64, line: f64) -> (f64, f64) {
        let g = &self.geometry;
        (
            (sample - g.boresight_sample) * g.pixel_pitch_mm,
            (line - g.boresight_line) * g.pixel_pitch_mm,
        )
    }

    fn in_frame(&self, sample: f64, line: f64) -> bool {
        let g = &self.geometry;
        (0.5..=g.samples as f64 + 0.5).contains(&sample) && (0.5..=g.lines as f64 + 0.5).contains(&line)
    }
}

impl Camera for FramingCamera {
    fn set_image(&mut self, sample: f64, line: f64) -> Result<bool> {
        self.state = None;
        let (x, y) = self.to_focal_plane(sample, line);
        let (ux, uy) = self.distortion.undistort(x, y);
        let look_camera = Vec3::new(ux, uy, self.geometry.focal_length_mm);

        let rotation = self.ephemeris.instrument_rotation(self.et)?;
        let spacecraft = self.ephemeris.spacecraft_position(self.et)?;
        let look = rotation * look_camera;
        let Some(hit) = self.shape.intersect(&spacecraft, &look)? else {
            return Ok(false);
        };
        self.state = Some(GroundState {
            sample,
            line,
            point: hit.point,
            local_normal: hit.normal,
            spacecraft,
            sun: self.ephemeris.sun_position(self.et)?,
        });
        Ok(true)
    }

    fn set_ground(&mut self, lat: f64, lon: f64) -> Result<bool> {
        self.state = None;
        let Some(point) = self.shape.surface_point(lat, lon)? else {
            return Ok(false);
        };
        let rotation = self.ephemeris.instrument_rotation(self.et)?;
        let spacecraft = self.ephemeris.spacecraft_position(self.et)?;
        let look = point - spacecraft;
        let look_camera = rotation.transpose() * look;
        if look_camera.z <= 0.0 {
            return Ok(false);
        }

        let f = self.geometry.focal_length_mm;
        let (ux, uy) = (f * look_camera.x / look_camera.z, f * look_camera.y / look_camera.z);
        let (x, y) = self.distortion.distort(ux, uy);
        let g = &self.geometry;
        let sample = x / g.pixel_pitch_mm + g.boresight_sample;
        let line = y / g.pixel_pitch_mm + g.boresight_line;
        if !self.in_frame(sample, line) {
            return Ok(false);
        }

        // The point must be the first surface the ray meets.
        let Some(hit) = self.shape.intersect(&spacecraft, &look)? else {
            return Ok(false);
        };
        let tolerance = 1e-6 * look.norm().max(1.0);
        if (hit.point - point).norm() > tolerance {
            debug!(lat, lon, "Ground point is occluded");
            return Ok(false);
        }

        self.state = Some(GroundState {
            sample,
            line,
            point,
            local_normal: hit.normal,
            spacecraft,
            sun: self.ephemeris.sun_position(self.et)?,
        });
        Ok(true)
    }

    fn set_band(&mut self, band: usize) -> Result<()> {
        if band == 0 || band > self.geometry.bands {
            return Err(CubeError::bad_argument(format!(
                "band {} outside [1, {}]",
                band, self.geometry.bands
            )));
        }
        self.band = band;
        Ok(())
    }

    fn band(&self) -> usize {
        self.band
    }

    fn samples(&self) -> usize {
        self.geometry.samples
    }

    fn lines(&self) -> usize {
        self.geometry.lines
    }

    fn image_position(&self) -> Result<(f64, f64)> {
        let s = self.state()?;
        Ok((s.sample, s.line))
    }

    fn universal_latitude(&self) -> Result<f64> {
        Ok(direction_to_lat_lon(&self.state()?.point).0)
    }

    fn universal_longitude(&self) -> Result<f64> {
        Ok(direction_to_lat_lon(&self.state()?.point).1)
    }

    fn local_radius(&self) -> Result<f64> {
        Ok(self.state()?.point.norm())
    }

    fn phase_angle(&self) -> Result<f64> {
        let s = self.state()?;
        Ok(separation(&(s.spacecraft - s.point), &(s.sun - s.point)).to_degrees())
    }

    fn incidence_angle(&self) -> Result<f64> {
        let s = self.state()?;
        Ok(separation(&s.point, &(s.sun - s.point)).to_degrees())
    }

    fn emission_angle(&self) -> Result<f64> {
        let s = self.state()?;
        Ok(separation(&s.point, &(s.spacecraft - s.point)).to_degrees())
    }

    fn pixel_resolution(&self) -> Result<f64> {
        let s = self.state()?;
        let range_km = (s.point - s.spacecraft).norm();
        Ok(range_km * 1000.0 * self.geometry.pixel_pitch_mm / self.geometry.focal_length_mm)
    }

    fn local_photometric_angles(&self) -> Result<PhotometricAngles> {
        let s = self.state()?;
        let valid = s.local_normal.norm() > 0.0;
        let normal = if valid { s.local_normal } else { s.point };
        Ok(PhotometricAngles {
            phase: separation(&(s.spacecraft - s.point), &(s.sun - s.point)).to_degrees(),
            incidence: separation(&normal, &(s.sun - s.point)).to_degrees(),
            emission: separation(&normal, &(s.spacecraft - s.point)).to_degrees(),
            valid,
        })
    }

    fn pixel_pitch(&self) -> f64 {
        self.geometry.pixel_pitch_mm
    }

    fn distortion_map(&self) -> &dyn DistortionMap {
        self.distortion.as_ref()
    }
}
