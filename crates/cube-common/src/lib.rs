//! Common types shared across the cubekit workspace: errors, special-pixel
//! algebra, the pixel codec, preferences and the application parameter
//! surface.

pub mod app;
pub mod config;
pub mod error;
pub mod pixel;
pub mod special;

pub use app::{AppDefinition, ParameterDef, ParameterKind, Parameters};
pub use config::Preferences;
pub use error::{CubeError, ErrorKind, Result, ResultExt};
pub use pixel::{ByteOrder, FloatFormat, PixelCodec, PixelType};
pub use special::{SpecialPixel, SpecialRanges};
