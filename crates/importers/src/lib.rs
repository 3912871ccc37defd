//! Import adapters.
//!
//! Each foreign format is read in the same way: identify the file, parse
//! its header into a label tree, derive an [`ImportLayout`] describing the
//! pixel bytes, then copy the pixels into a cube through a
//! [`pipeline::ProcessSession`] with a [`RawImageSource`] as input. The
//! foreign header is kept as the cube's original label and translated into
//! `IsisCube` groups.

pub mod ddd;
pub mod detect;
pub mod fits;
pub mod foreign;
pub mod importer;
pub mod layout;
pub mod pds3;
pub mod pds4;
pub mod raw;
pub mod vicar;

pub use detect::{decompress_gzip, detect_format, ForeignFormat};
pub use foreign::{DataLocation, ForeignImage};
pub use importer::{ImportOptions, ImportResult, Importer};
pub use layout::{ImportLayout, Organization};
pub use raw::{RawImageSource, Sideplanes};
