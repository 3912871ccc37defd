//! Cube storage: band-sequential pixel files with an attached label tree,
//! auxiliary tables and the preserved original label.

pub mod buffer;
pub mod cache;
pub mod cube;
pub mod original;
pub mod table;

pub use buffer::{Buffer, Dimensions};
pub use cache::{CacheStats, LineCache};
pub use cube::{AccessMode, Cube, CubeAttributes};
pub use original::{LabelGrammar, OriginalLabel};
pub use table::{FieldDef, FieldType, FieldValue, Record, Table};
