//! Tile-streamed processing.
//!
//! A [`ProcessSession`] walks a [`TilePlan`] over one or more cubes. For
//! each tile it reads every input buffer, resets every output buffer to
//! NULL, calls the transform and writes the outputs back. Sessions run
//! sequentially or transform batches of tiles on the rayon pool.

pub mod io;
pub mod memory;
pub mod mosaic;
pub mod plan;
pub mod progress;
pub mod session;
pub mod shape;

pub use io::{TileSink, TileSource};
pub use memory::MemoryCube;
pub use mosaic::{mosaic, mosaic_cubes, BandCriteria, MosaicOptions, MosaicPriority, MosaicReport, Placement};
pub use plan::{BrickWalk, Origin, OriginList, TilePlan};
pub use progress::{CancellationToken, LogProgress, ProgressSink};
pub use session::{
    create_output, ExecutionMode, InputOptions, OutputOptions, ProcessSession, SessionInfo,
    SessionReport,
};
pub use shape::BufferShape;
