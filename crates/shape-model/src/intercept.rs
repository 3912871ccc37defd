//! The result of a ray striking a plate.

use crate::dsk::DskShapeModel;
use crate::geometry::{separation, Vec3};
use crate::plate::TriangularPlate;

/// Observer, look direction, surface point and the struck plate.
///
/// The plate is held by value together with a shared reference to the
/// model that produced it.
#[derive(Debug, Clone)]
pub struct Intercept {
    observer: Vec3,
    look: Vec3,
    point: Vec3,
    plate: TriangularPlate,
    shape: DskShapeModel,
}

impl Intercept {
    pub fn new(observer: Vec3, look: Vec3, point: Vec3, plate: TriangularPlate, shape: DskShapeModel) -> Self {
        Self {
            observer,
            look,
            point,
            plate,
            shape,
        }
    }

    pub fn observer(&self) -> Vec3 {
        self.observer
    }

    pub fn look_direction(&self) -> Vec3 {
        self.look
    }

    pub fn surface_point(&self) -> Vec3 {
        self.point
    }

    pub fn plate(&self) -> &TriangularPlate {
        &self.plate
    }

    pub fn plate_id(&self) -> usize {
        self.plate.id
    }

    pub fn shape(&self) -> &DskShapeModel {
        &self.shape
    }

    /// Unit outward normal of the struck plate.
    pub fn normal(&self) -> Vec3 {
        self.plate.normal()
    }

    /// Distance from the observer to the surface point.
    pub fn range(&self) -> f64 {
        (self.point - self.observer).norm()
    }

    /// Angle (radians) between the normal and the direction to the observer.
    pub fn emission_angle(&self) -> f64 {
        separation(&self.normal(), &(self.observer - self.point))
    }

    /// Angle (radians) between the normal and the direction to `sun`.
    pub fn incidence_angle(&self, sun: &Vec3) -> f64 {
        separation(&self.normal(), &(sun - self.point))
    }

    /// Angle (radians) between the normal and an arbitrary direction.
    pub fn separation_angle(&self, direction: &Vec3) -> f64 {
        self.plate.separation_angle(direction)
    }
}
