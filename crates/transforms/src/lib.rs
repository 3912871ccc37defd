//! Reusable cube operations.
//!
//! Every operation is a plain function over the buffers of one tile, so it
//! can be handed to a [`pipeline::ProcessSession`] directly. The runners in
//! each module wire the usual inputs and outputs for callers that do not
//! need a custom session.

pub mod backplane;
pub mod bandtrim;
pub mod calibration;
pub mod grid;
pub mod lognegative;
pub mod reseau;
pub mod stretch;

pub use backplane::{Backplane, GeometryBackplane};
pub use bandtrim::{band_trim, band_trim_tile, run_band_trim};
pub use calibration::{dark_subtract, flat_field, flat_field_pixel, flat_field_tile, radiometry_group};
pub use grid::{to_gml, GridLine, GridLineKind, GridOptions, GridWalker};
pub use lognegative::LogNegative;
pub use reseau::{patch_brick, patch_reseaus, Reseau, ReseauPatch, ReseauPolicy, ReseauTable};
pub use stretch::{ExposureNormalizer, LinearStretch};
