//! A cube held entirely in memory.

use crate::io::{clip, TileSink, TileSource};
use cube_common::Result;
use cube_store::{Buffer, Dimensions};

/// In-memory cube of canonical values. Unlike file cubes it may have zero
/// lines or samples, which makes it handy for driving degenerate walks.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryCube {
    dims: Dimensions,
    data: Vec<f64>,
}

impl MemoryCube {
    /// A NULL-filled cube.
    pub fn new(dims: Dimensions) -> Self {
        let data = Buffer::new(dims).data().to_vec();
        Self { dims, data }
    }

    pub fn from_fn(dims: Dimensions, f: impl Fn(usize, usize, usize) -> f64) -> Self {
        let mut cube = Self::new(dims);
        for b in 1..=dims.bands {
            for l in 1..=dims.lines {
                for s in 1..=dims.samples {
                    let i = cube.index(s, l, b);
                    cube.data[i] = f(s, l, b);
                }
            }
        }
        cube
    }

    fn index(&self, s: usize, l: usize, b: usize) -> usize {
        ((b - 1) * self.dims.lines + (l - 1)) * self.dims.samples + (s - 1)
    }

    /// Value at a 1-based position.
    pub fn get(&self, s: usize, l: usize, b: usize) -> f64 {
        self.data[self.index(s, l, b)]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

impl TileSource for MemoryCube {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }

    fn read_tile(&mut self, buffer: &mut Buffer) -> Result<()> {
        buffer.fill_null();
        let Some(((s0, s1), (l0, l1), (b0, b1))) = clip(buffer, self.dims) else {
            return Ok(());
        };
        let (os, ol, ob) = buffer.origin();
        for b in b0..=b1 {
            for l in l0..=l1 {
                for s in s0..=s1 {
                    let v = self.data[self.index(s as usize, l as usize, b as usize)];
                    buffer.set((s - os) as usize, (l - ol) as usize, (b - ob) as usize, v);
                }
            }
        }
        Ok(())
    }
}

impl TileSink for MemoryCube {
    fn dimensions(&self) -> Dimensions {
        self.dims
    }

    fn write_tile(&mut self, buffer: &Buffer) -> Result<()> {
        let Some(((s0, s1), (l0, l1), (b0, b1))) = clip(buffer, self.dims) else {
            return Ok(());
        };
        let (os, ol, ob) = buffer.origin();
        for b in b0..=b1 {
            for l in l0..=l1 {
                for s in s0..=s1 {
                    let i = self.index(s as usize, l as usize, b as usize);
                    self.data[i] = buffer.get((s - os) as usize, (l - ol) as usize, (b - ob) as usize);
                }
            }
        }
        Ok(())
    }
}
