//! Sensor models.
//!
//! [`Camera`] is the contract calibration and geometry code depend on.
//! [`FramingCamera`] implements it for a pinhole frame sensor, casting rays
//! through any [`shape_model::ShapeModel`] with geometry supplied by an
//! [`EphemerisOracle`].

pub mod camera;
pub mod distortion;
pub mod ephemeris;
pub mod framing;

pub use camera::{Camera, PhotometricAngles};
pub use distortion::{DistortionMap, NoDistortion, RadialDistortion};
pub use ephemeris::{EphemerisOracle, StaticEphemeris};
pub use framing::{FrameGeometry, FramingCamera};
