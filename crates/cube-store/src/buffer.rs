//! Dimensions and pixel buffers.

use cube_common::special::NULL;
use cube_common::{CubeError, Result};

/// Extents of a cube: samples × lines × bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
}

impl Dimensions {
    pub fn new(samples: usize, lines: usize, bands: usize) -> Self {
        Self {
            samples,
            lines,
            bands,
        }
    }

    /// Total number of pixels.
    pub fn pixels(&self) -> usize {
        self.samples * self.lines * self.bands
    }

    /// Whether every axis is at least one.
    pub fn is_valid(&self) -> bool {
        self.samples >= 1 && self.lines >= 1 && self.bands >= 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(CubeError::bad_argument(format!(
                "cube dimensions {}x{}x{} must all be >= 1",
                self.samples, self.lines, self.bands
            )))
        }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.samples, self.lines, self.bands)
    }
}

/// A rectangular slab of canonical pixels with its 1-based origin in cube
/// coordinates. Data is band-major, then line, then sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    sample: i64,
    line: i64,
    band: i64,
    shape: Dimensions,
    data: Vec<f64>,
}

impl Buffer {
    /// A NULL-filled buffer at origin (1, 1, 1).
    pub fn new(shape: Dimensions) -> Self {
        Self {
            sample: 1,
            line: 1,
            band: 1,
            shape,
            data: vec![NULL; shape.pixels()],
        }
    }

    pub fn with_origin(shape: Dimensions, sample: i64, line: i64, band: i64) -> Self {
        let mut b = Self::new(shape);
        b.set_origin(sample, line, band);
        b
    }

    /// Wrap existing data; `data.len()` must equal the shape's pixel count.
    pub fn from_data(shape: Dimensions, data: Vec<f64>) -> Result<Self> {
        if data.len() != shape.pixels() {
            return Err(CubeError::bad_argument(format!(
                "{} values cannot fill a {} buffer",
                data.len(),
                shape
            )));
        }
        Ok(Self {
            sample: 1,
            line: 1,
            band: 1,
            shape,
            data,
        })
    }

    pub fn shape(&self) -> Dimensions {
        self.shape
    }

    pub fn samples(&self) -> usize {
        self.shape.samples
    }

    pub fn lines(&self) -> usize {
        self.shape.lines
    }

    pub fn bands(&self) -> usize {
        self.shape.bands
    }

    /// Origin as (sample, line, band).
    pub fn origin(&self) -> (i64, i64, i64) {
        (self.sample, self.line, self.band)
    }

    pub fn set_origin(&mut self, sample: i64, line: i64, band: i64) {
        self.sample = sample;
        self.line = line;
        self.band = band;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Index of a buffer-relative (0-based) position.
    #[inline]
    pub fn index(&self, s: usize, l: usize, b: usize) -> usize {
        (b * self.shape.lines + l) * self.shape.samples + s
    }

    #[inline]
    pub fn get(&self, s: usize, l: usize, b: usize) -> f64 {
        self.data[self.index(s, l, b)]
    }

    #[inline]
    pub fn set(&mut self, s: usize, l: usize, b: usize, value: f64) {
        let i = self.index(s, l, b);
        self.data[i] = value;
    }

    /// Cube coordinates (sample, line, band) of element `i`.
    pub fn position(&self, i: usize) -> (i64, i64, i64) {
        let plane = self.shape.samples * self.shape.lines;
        let b = i / plane;
        let l = (i % plane) / self.shape.samples;
        let s = i % self.shape.samples;
        (self.sample + s as i64, self.line + l as i64, self.band + b as i64)
    }

    /// One line of one band, buffer-relative.
    pub fn row(&self, l: usize, b: usize) -> &[f64] {
        let start = self.index(0, l, b);
        &self.data[start..start + self.shape.samples]
    }

    pub fn row_mut(&mut self, l: usize, b: usize) -> &mut [f64] {
        let start = self.index(0, l, b);
        let n = self.shape.samples;
        &mut self.data[start..start + n]
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    pub fn fill_null(&mut self) {
        self.fill(NULL);
    }

    /// Copy values from a buffer of identical shape.
    pub fn copy_from(&mut self, other: &Buffer) -> Result<()> {
        if other.shape != self.shape {
            return Err(CubeError::bad_argument(format!(
                "cannot copy a {} buffer into a {} buffer",
                other.shape, self.shape
            )));
        }
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// Inclusive cube-coordinate extent as
    /// ((s0, s1), (l0, l1), (b0, b1)).
    pub fn extent(&self) -> ((i64, i64), (i64, i64), (i64, i64)) {
        (
            (self.sample, self.sample + self.shape.samples as i64 - 1),
            (self.line, self.line + self.shape.lines as i64 - 1),
            (self.band, self.band + self.shape.bands as i64 - 1),
        )
    }

    /// Whether two buffers cover any common cube position.
    pub fn overlaps(&self, other: &Buffer) -> bool {
        let (a_s, a_l, a_b) = self.extent();
        let (b_s, b_l, b_b) = other.extent();
        let hit = |a: (i64, i64), b: (i64, i64)| a.0 <= b.1 && b.0 <= a.1;
        hit(a_s, b_s) && hit(a_l, b_l) && hit(a_b, b_b)
    }
}

impl std::ops::Index<usize> for Buffer {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        &self.data[i]
    }
}

impl std::ops::IndexMut<usize> for Buffer {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.data[i]
    }
}
