//! Tile plans: finite, restartable sequences of buffer origins.

use crate::shape::BufferShape;
use cube_store::Dimensions;

/// A 1-based (sample, line, band) origin.
pub type Origin = (i64, i64, i64);

/// A sequence of tile origins over a cube. `origins()` can be called any
/// number of times and always yields the same sequence.
pub trait TilePlan: Send + Sync {
    fn shape(&self) -> BufferShape;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn origins(&self) -> Box<dyn Iterator<Item = Origin> + Send + '_>;
}

/// The canonical walk: band-major, then line within band, then sample
/// within line, stepping by the shape's extent on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrickWalk {
    dims: Dimensions,
    shape: BufferShape,
}

impl BrickWalk {
    pub fn new(dims: Dimensions, shape: BufferShape) -> Self {
        Self { dims, shape }
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    fn counts(&self) -> (usize, usize, usize) {
        (
            self.dims.samples.div_ceil(self.shape.samples),
            self.dims.lines.div_ceil(self.shape.lines),
            self.dims.bands.div_ceil(self.shape.bands),
        )
    }

    /// Origin of the `index`-th tile.
    pub fn origin(&self, index: usize) -> Option<Origin> {
        if index >= self.len() {
            return None;
        }
        let (ns, nl, _) = self.counts();
        let s = index % ns;
        let l = (index / ns) % nl;
        let b = index / (ns * nl);
        Some((
            1 + (s * self.shape.samples) as i64,
            1 + (l * self.shape.lines) as i64,
            1 + (b * self.shape.bands) as i64,
        ))
    }

    pub fn iter(&self) -> BrickIter {
        BrickIter { walk: *self, next: 0 }
    }
}

impl TilePlan for BrickWalk {
    fn shape(&self) -> BufferShape {
        self.shape
    }

    fn len(&self) -> usize {
        let (s, l, b) = self.counts();
        s * l * b
    }

    fn origins(&self) -> Box<dyn Iterator<Item = Origin> + Send + '_> {
        Box::new(self.iter())
    }
}

/// Lazy iterator over a [`BrickWalk`].
#[derive(Debug, Clone)]
pub struct BrickIter {
    walk: BrickWalk,
    next: usize,
}

impl Iterator for BrickIter {
    type Item = Origin;

    fn next(&mut self) -> Option<Origin> {
        let origin = self.walk.origin(self.next)?;
        self.next += 1;
        Some(origin)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.walk.len().saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for BrickIter {}

/// An explicit list of origins, for walks the canonical order cannot
/// express (e.g. bricks centred on reseau marks).
#[derive(Debug, Clone, PartialEq)]
pub struct OriginList {
    shape: BufferShape,
    origins: Vec<Origin>,
}

impl OriginList {
    pub fn new(shape: BufferShape, origins: Vec<Origin>) -> Self {
        Self { shape, origins }
    }
}

impl TilePlan for OriginList {
    fn shape(&self) -> BufferShape {
        self.shape
    }

    fn len(&self) -> usize {
        self.origins.len()
    }

    fn origins(&self) -> Box<dyn Iterator<Item = Origin> + Send + '_> {
        Box::new(self.origins.iter().copied())
    }
}
