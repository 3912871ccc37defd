//! Per-pixel geometry planes computed through a camera.

use camera::Camera;
use cube_common::special::NULL;
use cube_common::{CubeError, ErrorKind, Preferences, Result};
use cube_store::{Buffer, Dimensions};
use label::{Container, Keyword};
use pipeline::{BufferShape, LogProgress, ProcessSession, SessionReport, TileSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backplane {
    Latitude,
    Longitude,
    Radius,
    Phase,
    Incidence,
    Emission,
    Resolution,
}

impl Backplane {
    pub const ALL: [Backplane; 7] = [
        Self::Latitude,
        Self::Longitude,
        Self::Radius,
        Self::Phase,
        Self::Incidence,
        Self::Emission,
        Self::Resolution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latitude => "Latitude",
            Self::Longitude => "Longitude",
            Self::Radius => "Radius",
            Self::Phase => "Phase Angle",
            Self::Incidence => "Incidence Angle",
            Self::Emission => "Emission Angle",
            Self::Resolution => "Pixel Resolution",
        }
    }

    fn compute(&self, camera: &dyn Camera) -> Result<f64> {
        match self {
            Self::Latitude => camera.universal_latitude(),
            Self::Longitude => camera.universal_longitude(),
            Self::Radius => camera.local_radius(),
            Self::Phase => camera.phase_angle(),
            Self::Incidence => camera.incidence_angle(),
            Self::Emission => camera.emission_angle(),
            Self::Resolution => camera.pixel_resolution(),
        }
    }
}

/// Camera failures for a single pixel become NULL; anything else aborts.
fn or_null(result: Result<f64>) -> Result<f64> {
    match result {
        Ok(v) if v.is_finite() => Ok(v),
        Ok(_) => Ok(NULL),
        Err(e) if e.kind() == ErrorKind::Camera => Ok(NULL),
        Err(e) => Err(e),
    }
}

/// Writes one band per requested plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryBackplane {
    planes: Vec<Backplane>,
}

impl GeometryBackplane {
    pub fn new(planes: Vec<Backplane>) -> Result<Self> {
        if planes.is_empty() {
            return Err(CubeError::bad_argument("at least one backplane is required"));
        }
        Ok(Self { planes })
    }

    pub fn planes(&self) -> &[Backplane] {
        &self.planes
    }

    /// Dimensions the output must have for `camera`.
    pub fn dimensions(&self, camera: &dyn Camera) -> Dimensions {
        Dimensions::new(camera.samples(), camera.lines(), self.planes.len())
    }

    /// `BandBin` group naming each output band.
    pub fn band_bin(&self) -> Container {
        let mut group = Container::new("BandBin");
        group.add_keyword(Keyword::array("Name", self.planes.iter().map(|p| p.as_str())));
        group
    }

    /// Fill every plane of one spectrum-deep line buffer.
    fn fill_line(&self, camera: &mut dyn Camera, out: &mut Buffer) -> Result<()> {
        let (s0, l0, _) = out.origin();
        for l in 0..out.lines() {
            for s in 0..out.samples() {
                let sample = (s0 + s as i64) as f64;
                let line = (l0 + l as i64) as f64;
                let hit = match camera.set_image(sample, line) {
                    Ok(hit) => hit,
                    Err(e) if e.kind() == ErrorKind::Camera => false,
                    Err(e) => return Err(e),
                };
                for (b, plane) in self.planes.iter().enumerate() {
                    let value = if hit { or_null(plane.compute(camera))? } else { NULL };
                    out.set(s, l, b, value);
                }
            }
        }
        Ok(())
    }

    /// Compute every plane for every pixel of `camera` into `output`.
    pub fn run<'a>(
        &self,
        prefs: &Preferences,
        camera: &mut dyn Camera,
        output: impl TileSink + 'a,
    ) -> Result<SessionReport> {
        let dims = self.dimensions(camera);
        if output.dimensions() != dims {
            return Err(CubeError::bad_argument(format!(
                "backplane output is {} but the camera needs {}",
                output.dimensions(),
                dims
            )));
        }
        let mut session = ProcessSession::new("backplanes", prefs);
        session.add_output(output);
        session
            .set_shape(BufferShape::new(dims.samples, 1, dims.bands))
            .set_progress(LogProgress::new());
        session.run_mut(|_, outputs| {
            let out = outputs
                .first_mut()
                .ok_or_else(|| CubeError::bad_argument("backplanes expect an output"))?;
            self.fill_line(camera, out)
        })
    }
}
