//! The DSK facade: shared, serialized access to a loaded plate kernel.
//!
//! Any number of [`DskShapeModel`] values may share one [`DskHandle`]. The
//! handle's mutex serializes every call into the kernel, and the kernel is
//! released when the last model referencing it is dropped.

use crate::geometry::{lat_lon_to_direction, Vec3};
use crate::intercept::Intercept;
use crate::kernel::{PlateKernel, SegmentDescriptor};
use crate::plate::TriangularPlate;
use crate::tolerance::Tolerance;
use cube_common::{CubeError, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// An opened kernel plus the lock guarding it.
#[derive(Debug)]
pub struct DskHandle {
    path: PathBuf,
    kernel: Mutex<PlateKernel>,
}

impl DskHandle {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let kernel = PlateKernel::load(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            kernel: Mutex::new(kernel),
        })
    }

    pub fn from_kernel(kernel: PlateKernel) -> Self {
        Self {
            path: kernel.source().to_path_buf(),
            kernel: Mutex::new(kernel),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with<T>(&self, f: impl FnOnce(&PlateKernel) -> T) -> T {
        let kernel = self.kernel.lock();
        f(&kernel)
    }
}

impl Drop for DskHandle {
    fn drop(&mut self) {
        debug!(file = %self.path.display(), "Closed DSK");
    }
}

/// A logical shape model over a shared DSK handle.
#[derive(Debug, Clone, Default)]
pub struct DskShapeModel {
    handle: Option<Arc<DskHandle>>,
    tolerance: Tolerance,
}

impl DskShapeModel {
    /// A facade with no kernel; every query fails with a configuration
    /// error until one is opened.
    pub fn unopened() -> Self {
        Self::default()
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_handle(Arc::new(DskHandle::open(path)?)))
    }

    pub fn from_kernel(kernel: PlateKernel) -> Self {
        Self::from_handle(Arc::new(DskHandle::from_kernel(kernel)))
    }

    pub fn from_handle(handle: Arc<DskHandle>) -> Self {
        Self {
            handle: Some(handle),
            tolerance: Tolerance::default(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Number of models sharing this model's handle.
    pub fn handle_references(&self) -> usize {
        self.handle.as_ref().map_or(0, Arc::strong_count)
    }

    pub fn shares_handle_with(&self, other: &DskShapeModel) -> bool {
        match (&self.handle, &other.handle) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn handle(&self) -> Result<&Arc<DskHandle>> {
        self.handle
            .as_ref()
            .ok_or_else(|| CubeError::configuration("DSK shape model has not been opened"))
    }

    pub fn path(&self) -> Result<&Path> {
        Ok(self.handle()?.path())
    }

    pub fn plate_count(&self) -> Result<usize> {
        Ok(self.handle()?.with(PlateKernel::plate_count))
    }

    pub fn vertex_count(&self) -> Result<usize> {
        Ok(self.handle()?.with(PlateKernel::vertex_count))
    }

    pub fn segment(&self) -> Result<SegmentDescriptor> {
        Ok(self.handle()?.with(|k| k.segment().clone()))
    }

    pub fn max_radius(&self) -> Result<f64> {
        Ok(self.handle()?.with(PlateKernel::max_radius))
    }

    pub fn plate(&self, id: usize) -> Result<TriangularPlate> {
        self.handle()?.with(|k| k.plate(id))
    }

    pub fn plate_vertex_ids(&self, id: usize) -> Result<[usize; 3]> {
        self.handle()?.with(|k| k.plate_vertex_ids(id))
    }

    pub fn vertex(&self, id: usize) -> Result<Vec3> {
        self.handle()?.with(|k| k.vertex(id))
    }

    /// First plate struck by the ray from `observer` along `look`.
    /// A miss is `Ok(None)`.
    pub fn intercept(&self, observer: &Vec3, look: &Vec3) -> Result<Option<Intercept>> {
        let handle = self.handle()?;
        if look.norm() == 0.0 {
            return Err(CubeError::bad_argument("look direction must be non-zero"));
        }
        let hit = handle.with(|k| k.intercept(observer, look, &self.tolerance));
        Ok(hit.map(|(plate, point)| Intercept::new(*observer, *look, point, plate, self.clone())))
    }

    /// Surface point under (lat, lon) in degrees, found by casting from
    /// 1.5 times the maximum radius toward the center.
    pub fn surface_point(&self, lat: f64, lon: f64) -> Result<Option<Vec3>> {
        Ok(self.lat_lon_intercept(lat, lon)?.map(|i| i.surface_point()))
    }

    /// Intercept under (lat, lon) in degrees.
    pub fn lat_lon_intercept(&self, lat: f64, lon: f64) -> Result<Option<Intercept>> {
        let direction = lat_lon_to_direction(lat, lon);
        let observer = direction * (1.5 * self.max_radius()?);
        self.intercept(&observer, &(-direction))
    }

    pub fn local_radius(&self, lat: f64, lon: f64) -> Result<Option<f64>> {
        Ok(self.surface_point(lat, lon)?.map(|p| p.norm()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::ErrorKind;

    fn unit_plate_model() -> DskShapeModel {
        let kernel = PlateKernel::from_parts(vec![Vec3::x(), Vec3::y(), Vec3::z()], vec![[1, 2, 3]]).unwrap();
        DskShapeModel::from_kernel(kernel)
    }

    #[test]
    fn test_unopened_is_configuration_error() {
        let model = DskShapeModel::unopened();
        let err = model.intercept(&Vec3::x(), &(-Vec3::x())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(model.plate_count().unwrap_err().kind(), ErrorKind::Configuration);
        assert_eq!(model.surface_point(0.0, 0.0).unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_clones_share_one_handle() {
        let model = unit_plate_model();
        assert_eq!(model.handle_references(), 1);
        let copy = model.clone();
        assert!(copy.shares_handle_with(&model));
        assert_eq!(model.handle_references(), 2);
        drop(copy);
        assert_eq!(model.handle_references(), 1);
    }

    #[test]
    fn test_intercept_holds_model_reference() {
        let model = unit_plate_model();
        let hit = model
            .intercept(&Vec3::new(1000.0, 0.0, 0.0), &Vec3::new(-1.0, 0.0, 0.0))
            .unwrap()
            .unwrap();
        assert_eq!(hit.plate_id(), 1);
        assert_eq!(model.handle_references(), 2);
        assert!(hit.shape().shares_handle_with(&model));
    }

    #[test]
    fn test_zero_look_is_bad_argument() {
        let model = unit_plate_model();
        let err = model.intercept(&Vec3::x(), &Vec3::zeros()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgument);
    }

    #[test]
    fn test_missing_file_is_user_error() {
        let err = DskShapeModel::open("/nonexistent/phobos.bds").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::User);
        assert!(err.to_string().contains("phobos.bds"));
    }
}
