//! Map projections for planetary bodies.
//!
//! Projections are pure functions between planetocentric, positive-east
//! ground coordinates in degrees and projection coordinates in metres.
//! They are configured from a label `Mapping` group with
//! [`from_mapping_group`].

pub mod cylindrical;
pub mod lambert;
pub mod mapping;

pub use cylindrical::{Equirectangular, SimpleCylindrical};
pub use lambert::LambertConformal;
pub use mapping::{from_mapping_group, GroundRange, LongitudeDomain, MappingParameters};

/// Forward and inverse mapping between ground and projection coordinates.
pub trait MapProjection: Send + Sync + std::fmt::Debug {
    /// Value of the `ProjectionName` keyword.
    fn name(&self) -> &'static str;

    fn parameters(&self) -> &MappingParameters;

    /// Projection (x, y) in metres for (lat, lon) in degrees, or `None`
    /// where the projection is undefined.
    fn set_ground(&self, lat: f64, lon: f64) -> Option<(f64, f64)>;

    /// Ground (lat, lon) in degrees for projection (x, y), with longitude
    /// in the configured domain.
    fn set_coordinate(&self, x: f64, y: f64) -> Option<(f64, f64)>;

    fn ground_range(&self) -> Option<GroundRange> {
        self.parameters().range
    }
}
