//! Buffer shapes used to walk a cube.

use cube_common::{CubeError, Result};
use cube_store::Dimensions;

/// Extent of the buffer handed to a transform: (samples, lines, bands).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferShape {
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
}

impl BufferShape {
    pub fn new(samples: usize, lines: usize, bands: usize) -> Self {
        Self { samples, lines, bands }
    }

    /// One full line of one band: (NS, 1, 1).
    pub fn line(dims: Dimensions) -> Self {
        Self::new(dims.samples.max(1), 1, 1)
    }

    /// One full band: (NS, NL, 1).
    pub fn band(dims: Dimensions) -> Self {
        Self::new(dims.samples.max(1), dims.lines.max(1), 1)
    }

    /// Every band of one pixel: (1, 1, NB).
    pub fn spectrum(dims: Dimensions) -> Self {
        Self::new(1, 1, dims.bands.max(1))
    }

    /// A square tile of one band.
    pub fn tile(size: usize) -> Self {
        Self::new(size, size, 1)
    }

    pub fn brick(samples: usize, lines: usize, bands: usize) -> Self {
        Self::new(samples, lines, bands)
    }

    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 || self.lines == 0 || self.bands == 0 {
            return Err(CubeError::bad_argument(format!(
                "buffer shape {}x{}x{} must be at least 1 in every axis",
                self.samples, self.lines, self.bands
            )));
        }
        Ok(())
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.samples, self.lines, self.bands)
    }

    pub fn pixels(&self) -> usize {
        self.samples * self.lines * self.bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_shapes() {
        let dims = Dimensions::new(10, 20, 3);
        assert_eq!(BufferShape::line(dims), BufferShape::new(10, 1, 1));
        assert_eq!(BufferShape::band(dims), BufferShape::new(10, 20, 1));
        assert_eq!(BufferShape::spectrum(dims), BufferShape::new(1, 1, 3));
        assert!(BufferShape::new(0, 1, 1).validate().is_err());
    }
}
