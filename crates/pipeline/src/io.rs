//! Tile sources and sinks.
//!
//! The session only ever talks to cubes through these two traits, so
//! cube files, in-memory cubes and foreign raw images can be mixed freely.

use cube_common::Result;
use cube_store::{Buffer, Cube, Dimensions};

/// Something a session can read buffers from.
pub trait TileSource {
    fn dimensions(&self) -> Dimensions;

    /// Fill `buffer` from its origin. Positions outside the source become
    /// NULL.
    fn read_tile(&mut self, buffer: &mut Buffer) -> Result<()>;
}

/// Something a session can write buffers to.
pub trait TileSink {
    fn dimensions(&self) -> Dimensions;

    /// Store `buffer` at its origin, clipped to the sink's extent.
    fn write_tile(&mut self, buffer: &Buffer) -> Result<()>;

    /// Called once after the last tile.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl TileSource for Cube {
    fn dimensions(&self) -> Dimensions {
        Cube::dimensions(self)
    }

    fn read_tile(&mut self, buffer: &mut Buffer) -> Result<()> {
        self.read(buffer)
    }
}

impl TileSink for Cube {
    fn dimensions(&self) -> Dimensions {
        Cube::dimensions(self)
    }

    fn write_tile(&mut self, buffer: &Buffer) -> Result<()> {
        self.write(buffer)
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()
    }
}

impl<T: TileSource + ?Sized> TileSource for &mut T {
    fn dimensions(&self) -> Dimensions {
        (**self).dimensions()
    }

    fn read_tile(&mut self, buffer: &mut Buffer) -> Result<()> {
        (**self).read_tile(buffer)
    }
}

impl<T: TileSink + ?Sized> TileSink for &mut T {
    fn dimensions(&self) -> Dimensions {
        (**self).dimensions()
    }

    fn write_tile(&mut self, buffer: &Buffer) -> Result<()> {
        (**self).write_tile(buffer)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

impl<T: TileSource + ?Sized> TileSource for Box<T> {
    fn dimensions(&self) -> Dimensions {
        (**self).dimensions()
    }

    fn read_tile(&mut self, buffer: &mut Buffer) -> Result<()> {
        (**self).read_tile(buffer)
    }
}

/// Clipped overlap of a buffer with a cube of `dims`, as inclusive 1-based
/// ranges. `None` when they do not intersect.
pub fn clip(buffer: &Buffer, dims: Dimensions) -> Option<((i64, i64), (i64, i64), (i64, i64))> {
    let ((s0, s1), (l0, l1), (b0, b1)) = buffer.extent();
    let s = (s0.max(1), s1.min(dims.samples as i64));
    let l = (l0.max(1), l1.min(dims.lines as i64));
    let b = (b0.max(1), b1.min(dims.bands as i64));
    if s.0 > s.1 || l.0 > l.1 || b.0 > b.1 {
        return None;
    }
    Some((s, l, b))
}
