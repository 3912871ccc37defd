//! The surface contract cameras depend on.

use crate::dsk::DskShapeModel;
use crate::geometry::Vec3;
use cube_common::Result;

/// A ray/surface hit as seen by a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceHit {
    pub point: Vec3,
    /// Unit outward normal at the point.
    pub normal: Vec3,
    /// Struck plate for plate models.
    pub plate_id: Option<usize>,
}

/// A body surface in body-fixed coordinates.
pub trait ShapeModel: Send + Sync {
    fn name(&self) -> &str;

    /// First surface point along the ray, or `None` on a miss.
    fn intersect(&self, observer: &Vec3, look: &Vec3) -> Result<Option<SurfaceHit>>;

    /// Surface point under (lat, lon) in degrees.
    fn surface_point(&self, lat: f64, lon: f64) -> Result<Option<Vec3>>;

    fn max_radius(&self) -> Result<f64>;

    fn local_radius(&self, lat: f64, lon: f64) -> Result<Option<f64>> {
        Ok(self.surface_point(lat, lon)?.map(|p| p.norm()))
    }
}

impl ShapeModel for DskShapeModel {
    fn name(&self) -> &str {
        "DskShape"
    }

    fn intersect(&self, observer: &Vec3, look: &Vec3) -> Result<Option<SurfaceHit>> {
        Ok(self.intercept(observer, look)?.map(|i| SurfaceHit {
            point: i.surface_point(),
            normal: i.normal(),
            plate_id: Some(i.plate_id()),
        }))
    }

    fn surface_point(&self, lat: f64, lon: f64) -> Result<Option<Vec3>> {
        DskShapeModel::surface_point(self, lat, lon)
    }

    fn max_radius(&self) -> Result<f64> {
        DskShapeModel::max_radius(self)
    }
}
