//! Plate shape models and ray intersection.
//!
//! A plate kernel is a triangular mesh of a body surface in body-fixed
//! coordinates. [`DskShapeModel`] wraps a shared, mutex-guarded kernel and
//! answers two questions: where does a ray from an observer first strike
//! the surface, and what is the surface point under a latitude/longitude.
//!
//! ```ignore
//! use shape_model::{DskShapeModel, Vec3};
//!
//! let model = DskShapeModel::open("phobos.plt")?;
//! if let Some(hit) = model.intercept(&Vec3::new(100.0, 0.0, 0.0), &Vec3::new(-1.0, 0.0, 0.0))? {
//!     println!("plate {} emission {}", hit.plate_id(), hit.emission_angle().to_degrees());
//! }
//! ```

pub mod bvh;
pub mod dsk;
pub mod ellipsoid;
pub mod geometry;
pub mod intercept;
pub mod kernel;
pub mod plate;
pub mod shape;
pub mod tolerance;

pub use dsk::{DskHandle, DskShapeModel};
pub use ellipsoid::EllipsoidShape;
pub use geometry::{direction_to_lat_lon, lat_lon_to_direction, separation, to_vector, Vec3};
pub use intercept::Intercept;
pub use kernel::{PlateKernel, SegmentDescriptor};
pub use plate::TriangularPlate;
pub use shape::{ShapeModel, SurfaceHit};
pub use tolerance::Tolerance;
