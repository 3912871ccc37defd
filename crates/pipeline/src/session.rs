//! Processing sessions: walk a tile plan, read input buffers, hand them to
//! a transform and write the output buffers back.

use crate::io::{TileSink, TileSource};
use crate::plan::{BrickWalk, Origin, TilePlan};
use crate::progress::{CancellationToken, ProgressSink};
use crate::shape::BufferShape;
use cube_common::{CubeError, PixelType, Preferences, Result};
use cube_store::{Buffer, Cube, CubeAttributes, Dimensions};
use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// How tiles are handed to the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One tile at a time, in plan order.
    Sequential,
    /// Up to `batch` tiles transformed concurrently. Tiles are still read
    /// and written in plan order, and tiles whose output regions overlap
    /// never share a batch.
    TileParallel { batch: usize },
}

/// Per-input walk options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputOptions {
    /// Buffer shape for this input. Defaults to the session shape.
    pub shape: Option<BufferShape>,
    /// (sample, line) offset of the input buffer relative to the tile
    /// origin. Negative offsets give a halo around the output tile.
    pub offset: (i64, i64),
}

impl InputOptions {
    pub fn with_shape(mut self, shape: BufferShape) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Read `radius` extra pixels on every side of the output tile.
    pub fn with_halo(mut self, shape: BufferShape, radius: usize) -> Self {
        let r = radius as i64;
        self.shape = Some(BufferShape::new(
            shape.samples + 2 * radius,
            shape.lines + 2 * radius,
            shape.bands,
        ));
        self.offset = (-r, -r);
        self
    }
}

/// What a pre-pass callback sees before the first tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    pub dimensions: Dimensions,
    pub shape: BufferShape,
    pub total_tiles: usize,
    pub inputs: usize,
    pub outputs: usize,
}

/// Outcome of a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub tiles: usize,
    pub total_tiles: usize,
    pub mode: ExecutionMode,
}

struct Input<'a> {
    source: Box<dyn TileSource + 'a>,
    options: InputOptions,
}

struct TileBuffers {
    inputs: Vec<Buffer>,
    outputs: Vec<Buffer>,
}

type PrePass<'a> = Box<dyn FnOnce(&SessionInfo) -> Result<()> + 'a>;
type PostPass<'a> = Box<dyn FnOnce(&SessionReport) -> Result<()> + 'a>;

/// A single pass over a set of input and output cubes.
///
/// Sources and sinks are either owned (closed when the session ends) or
/// borrowed through `&mut`.
pub struct ProcessSession<'a> {
    name: String,
    inputs: Vec<Input<'a>>,
    outputs: Vec<Box<dyn TileSink + 'a>>,
    shape: Option<BufferShape>,
    plan: Option<Box<dyn TilePlan + 'a>>,
    mode: ExecutionMode,
    tile_size: usize,
    default_batch: usize,
    progress: Option<Box<dyn ProgressSink + 'a>>,
    cancel: CancellationToken,
    pre_pass: Option<PrePass<'a>>,
    post_pass: Option<PostPass<'a>>,
}

impl<'a> ProcessSession<'a> {
    pub fn new(name: impl Into<String>, prefs: &Preferences) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            shape: None,
            plan: None,
            mode: ExecutionMode::Sequential,
            tile_size: prefs.tile_size.max(1),
            default_batch: prefs.parallel_batch.max(1),
            progress: None,
            cancel: CancellationToken::new(),
            pre_pass: None,
            post_pass: None,
        }
    }

    /// Add an input walked with the session shape. Returns its index.
    pub fn add_input(&mut self, source: impl TileSource + 'a) -> usize {
        self.add_input_with(source, InputOptions::default())
    }

    pub fn add_input_with(&mut self, source: impl TileSource + 'a, options: InputOptions) -> usize {
        self.inputs.push(Input {
            source: Box::new(source),
            options,
        });
        self.inputs.len() - 1
    }

    pub fn add_output(&mut self, sink: impl TileSink + 'a) -> usize {
        self.outputs.push(Box::new(sink));
        self.outputs.len() - 1
    }

    /// Walk with buffers of `shape` in canonical order. The default is one
    /// line at a time.
    pub fn set_shape(&mut self, shape: BufferShape) -> &mut Self {
        self.shape = Some(shape);
        self
    }

    /// Walk square tiles of the configured tile size.
    pub fn set_tiles(&mut self) -> &mut Self {
        self.shape = Some(BufferShape::tile(self.tile_size));
        self
    }

    /// Walk an explicit plan instead of the canonical one.
    pub fn set_plan(&mut self, plan: impl TilePlan + 'a) -> &mut Self {
        self.plan = Some(Box::new(plan));
        self
    }

    pub fn set_mode(&mut self, mode: ExecutionMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Tile-parallel mode with the configured batch size.
    pub fn parallel(&mut self) -> &mut Self {
        self.mode = ExecutionMode::TileParallel {
            batch: self.default_batch,
        };
        self
    }

    pub fn set_progress(&mut self, sink: impl ProgressSink + 'a) -> &mut Self {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn set_cancellation(&mut self, token: CancellationToken) -> &mut Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn on_pre_pass(&mut self, f: impl FnOnce(&SessionInfo) -> Result<()> + 'a) -> &mut Self {
        self.pre_pass = Some(Box::new(f));
        self
    }

    pub fn on_post_pass(&mut self, f: impl FnOnce(&SessionReport) -> Result<()> + 'a) -> &mut Self {
        self.post_pass = Some(Box::new(f));
        self
    }

    /// Extent of the walk: the outputs if there are any, otherwise the
    /// first input.
    fn walk_dimensions(&self) -> Result<Dimensions> {
        let dims = match (self.outputs.first(), self.inputs.first()) {
            (Some(out), _) => out.dimensions(),
            (None, Some(input)) => input.source.dimensions(),
            (None, None) => {
                return Err(CubeError::bad_argument(format!(
                    "session '{}' has neither inputs nor outputs",
                    self.name
                )))
            }
        };
        for (i, out) in self.outputs.iter().enumerate() {
            if out.dimensions() != dims {
                return Err(CubeError::bad_argument(format!(
                    "output {} of session '{}' is {} but the walk is {}",
                    i + 1,
                    self.name,
                    out.dimensions(),
                    dims
                )));
            }
        }
        for (i, input) in self.inputs.iter().enumerate() {
            let bands = input.source.dimensions().bands;
            if bands != dims.bands && bands != 1 {
                return Err(CubeError::bad_argument(format!(
                    "input {} of session '{}' has {} bands; expected {} or 1",
                    i + 1,
                    self.name,
                    bands,
                    dims.bands
                )));
            }
        }
        Ok(dims)
    }

    fn allocate(&self, shape: BufferShape, walk_bands: usize) -> TileBuffers {
        let inputs = self
            .inputs
            .iter()
            .map(|input| {
                let mut s = input.options.shape.unwrap_or(shape);
                let bands = input.source.dimensions().bands;
                if bands == 1 && walk_bands > 1 {
                    s.bands = 1;
                }
                Buffer::new(s.dimensions())
            })
            .collect();
        let outputs = self.outputs.iter().map(|_| Buffer::new(shape.dimensions())).collect();
        TileBuffers { inputs, outputs }
    }

    fn load(&mut self, origin: Origin, walk_bands: usize, tile: &mut TileBuffers) -> Result<()> {
        let (s, l, b) = origin;
        for (input, buffer) in self.inputs.iter_mut().zip(tile.inputs.iter_mut()) {
            let broadcast = input.source.dimensions().bands == 1 && walk_bands > 1;
            let band = if broadcast { 1 } else { b };
            let (ds, dl) = input.options.offset;
            buffer.set_origin(s + ds, l + dl, band);
            input.source.read_tile(buffer)?;
        }
        for buffer in tile.outputs.iter_mut() {
            buffer.set_origin(s, l, b);
            buffer.fill_null();
        }
        Ok(())
    }

    fn store(&mut self, tile: &TileBuffers) -> Result<()> {
        for (sink, buffer) in self.outputs.iter_mut().zip(tile.outputs.iter()) {
            sink.write_tile(buffer)?;
        }
        Ok(())
    }

    fn report(&mut self, done: usize, total: usize) {
        if let Some(progress) = self.progress.as_mut() {
            progress.report(done, total, &self.name);
        }
    }

    fn finish_sinks(&mut self) -> Result<()> {
        for sink in self.outputs.iter_mut() {
            sink.finish()?;
        }
        Ok(())
    }

    fn cancelled(&mut self, done: usize) -> Result<SessionReport> {
        warn!(session = %self.name, tiles = done, "Session cancelled");
        self.finish_sinks()?;
        Err(CubeError::cancelled(format!(
            "session '{}' cancelled after {} tiles",
            self.name, done
        )))
    }

    fn start(&mut self) -> Result<(Box<dyn TilePlan + 'a>, Dimensions)> {
        let dims = self.walk_dimensions()?;
        let plan: Box<dyn TilePlan + 'a> = match self.plan.take() {
            Some(plan) => plan,
            None => {
                let shape = self.shape.unwrap_or_else(|| BufferShape::line(dims));
                shape.validate()?;
                Box::new(BrickWalk::new(dims, shape))
            }
        };
        plan.shape().validate()?;

        let info = SessionInfo {
            dimensions: dims,
            shape: plan.shape(),
            total_tiles: plan.len(),
            inputs: self.inputs.len(),
            outputs: self.outputs.len(),
        };
        info!(
            session = %self.name,
            dims = %dims,
            tiles = info.total_tiles,
            mode = ?self.mode,
            "Starting session"
        );
        if let Some(pre) = self.pre_pass.take() {
            pre(&info)?;
        }
        Ok((plan, dims))
    }

    fn complete(mut self, tiles: usize, total_tiles: usize, started: Instant) -> Result<SessionReport> {
        self.finish_sinks()?;
        let report = SessionReport {
            tiles,
            total_tiles,
            mode: self.mode,
        };
        info!(
            session = %self.name,
            tiles,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Session complete"
        );
        let post = self.post_pass.take();
        // Owned cubes are closed here, before the post-pass runs.
        drop(self);
        if let Some(post) = post {
            post(&report)?;
        }
        Ok(report)
    }

    /// Run a transform that needs mutable state. Always sequential.
    pub fn run_mut<F>(mut self, mut f: F) -> Result<SessionReport>
    where
        F: FnMut(&[Buffer], &mut [Buffer]) -> Result<()>,
    {
        let started = Instant::now();
        let (plan, dims) = self.start()?;
        let total = plan.len();
        let mut tile = self.allocate(plan.shape(), dims.bands);
        let mut done = 0;
        for origin in plan.origins() {
            if self.cancel.is_cancelled() {
                return self.cancelled(done);
            }
            self.load(origin, dims.bands, &mut tile)?;
            f(&tile.inputs, &mut tile.outputs)?;
            self.store(&tile)?;
            done += 1;
            self.report(done, total);
        }
        drop(plan);
        self.complete(done, total, started)
    }

    /// Run a transform in the session's execution mode.
    pub fn run<F>(self, f: F) -> Result<SessionReport>
    where
        F: Fn(&[Buffer], &mut [Buffer]) -> Result<()> + Sync,
    {
        match self.mode {
            ExecutionMode::Sequential => self.run_mut(f),
            ExecutionMode::TileParallel { batch } => self.run_parallel(batch.max(1), f),
        }
    }

    fn run_parallel<F>(mut self, batch: usize, f: F) -> Result<SessionReport>
    where
        F: Fn(&[Buffer], &mut [Buffer]) -> Result<()> + Sync,
    {
        let started = Instant::now();
        let (plan, dims) = self.start()?;
        let total = plan.len();
        let shape = plan.shape();
        let mut pool: Vec<TileBuffers> = (0..batch.min(total.max(1)))
            .map(|_| self.allocate(shape, dims.bands))
            .collect();
        let has_outputs = !self.outputs.is_empty();
        let mut origins = plan.origins().peekable();
        let mut done = 0;

        loop {
            if self.cancel.is_cancelled() {
                return self.cancelled(done);
            }
            let mut group: Vec<Origin> = Vec::with_capacity(pool.len());
            while group.len() < pool.len() {
                let Some(&next) = origins.peek() else { break };
                if has_outputs && group.iter().any(|o| regions_overlap(*o, next, shape)) {
                    break;
                }
                group.push(next);
                origins.next();
            }
            if group.is_empty() {
                break;
            }

            for (k, origin) in group.iter().enumerate() {
                self.load(*origin, dims.bands, &mut pool[k])?;
            }
            pool[..group.len()]
                .par_iter_mut()
                .try_for_each(|tile| f(&tile.inputs, &mut tile.outputs))?;
            debug!(session = %self.name, batch = group.len(), "Transformed batch");

            for tile in &pool[..group.len()] {
                self.store(tile)?;
                done += 1;
                self.report(done, total);
            }
        }
        drop(origins);
        drop(plan);
        self.complete(done, total, started)
    }
}

fn regions_overlap(a: Origin, b: Origin, shape: BufferShape) -> bool {
    let hit = |a0: i64, b0: i64, n: usize| a0 < b0 + n as i64 && b0 < a0 + n as i64;
    hit(a.0, b.0, shape.samples) && hit(a.1, b.1, shape.lines) && hit(a.2, b.2, shape.bands)
}

/// How to create an output cube from an input cube.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputOptions {
    /// Storage type; the template's when unset.
    pub pixel_type: Option<PixelType>,
    /// Band count; the template's when unset.
    pub bands: Option<usize>,
    /// Copy label groups, tables and the original label.
    pub propagate: bool,
    /// Minimum label reservation; the template's when unset.
    pub label_bytes: Option<usize>,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            pixel_type: None,
            bands: None,
            propagate: true,
            label_bytes: None,
        }
    }
}

impl OutputOptions {
    pub fn with_pixel_type(mut self, pixel_type: PixelType) -> Self {
        self.pixel_type = Some(pixel_type);
        self
    }

    pub fn with_bands(mut self, bands: usize) -> Self {
        self.bands = Some(bands);
        self
    }

    pub fn without_propagation(mut self) -> Self {
        self.propagate = false;
        self
    }

    /// Reserve at least the preferences' label bytes.
    pub fn with_preferences(mut self, prefs: &Preferences) -> Self {
        self.label_bytes = Some(prefs.label_bytes);
        self
    }
}

/// Create an output cube shaped like `template`.
pub fn create_output(path: impl AsRef<Path>, template: &Cube, options: &OutputOptions) -> Result<Cube> {
    let mut attrs = CubeAttributes::like(template);
    if let Some(pixel_type) = options.pixel_type {
        if pixel_type != attrs.pixel_type {
            attrs = attrs.with_scaling(0.0, 1.0);
        }
        attrs.pixel_type = pixel_type;
    }
    if let Some(bands) = options.bands {
        attrs.dimensions.bands = bands;
    }
    if let Some(bytes) = options.label_bytes {
        let label_bytes = attrs.label_bytes.max(bytes);
        attrs = attrs.with_label_bytes(label_bytes);
    }
    if options.propagate {
        Cube::create_from(path, template, &attrs)
    } else {
        Cube::create(path, &attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_overlap() {
        let shape = BufferShape::new(4, 4, 1);
        assert!(regions_overlap((1, 1, 1), (4, 4, 1), shape));
        assert!(!regions_overlap((1, 1, 1), (5, 1, 1), shape));
        assert!(!regions_overlap((1, 1, 1), (1, 1, 2), shape));
    }
}
