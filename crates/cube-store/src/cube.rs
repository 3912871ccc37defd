//! Cube files.
//!
//! Attached layout: a reserved label area (zero padded), then band-sequential
//! pixels, then blobs (tables, original label). Detached layout: the label
//! file holds the label area followed by blobs, and `^DnFile` names a
//! separate file holding only pixels.

use crate::buffer::{Buffer, Dimensions};
use crate::cache::{CacheStats, LineCache};
use crate::original::OriginalLabel;
use crate::table::Table;
use cube_common::special::NULL;
use cube_common::{ByteOrder, CubeError, PixelCodec, PixelType, Preferences, Result, ResultExt};
use label::{pvl, Container, Keyword, Traverse, Value};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a cube was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Read,
    ReadWrite,
}

/// Parameters for creating a cube.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeAttributes {
    pub dimensions: Dimensions,
    pub pixel_type: PixelType,
    pub byte_order: ByteOrder,
    pub base: f64,
    pub multiplier: f64,
    /// Bytes reserved for the label.
    pub label_bytes: usize,
    /// Write pixels to a separate file.
    pub detached: bool,
}

impl CubeAttributes {
    pub fn new(dimensions: Dimensions, pixel_type: PixelType) -> Self {
        Self {
            dimensions,
            pixel_type,
            byte_order: ByteOrder::native(),
            base: 0.0,
            multiplier: 1.0,
            label_bytes: Preferences::default().label_bytes,
            detached: false,
        }
    }

    /// Same geometry and storage as an existing cube.
    pub fn like(cube: &Cube) -> Self {
        let codec = cube.codec();
        Self {
            dimensions: cube.dimensions(),
            pixel_type: codec.pixel_type,
            byte_order: codec.byte_order,
            base: codec.base,
            multiplier: codec.multiplier,
            label_bytes: cube.label_bytes,
            detached: false,
        }
    }

    pub fn with_scaling(mut self, base: f64, multiplier: f64) -> Self {
        self.base = base;
        self.multiplier = multiplier;
        self
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    /// Label reservation from the preferences.
    pub fn with_preferences(self, prefs: &Preferences) -> Self {
        self.with_label_bytes(prefs.label_bytes)
    }

    pub fn with_label_bytes(mut self, bytes: usize) -> Self {
        self.label_bytes = bytes;
        self
    }

    pub fn detached(mut self) -> Self {
        self.detached = true;
        self
    }
}

/// A cube file opened for reading or writing.
pub struct Cube {
    path: PathBuf,
    data_path: PathBuf,
    label_file: File,
    data_file: File,
    mode: AccessMode,
    dims: Dimensions,
    codec: PixelCodec,
    /// Byte offset of the first pixel in the data file.
    pixel_offset: u64,
    label_bytes: usize,
    detached: bool,
    label: Container,
    tables: Vec<Table>,
    original: Option<OriginalLabel>,
    dirty: bool,
    closed: bool,
    cache: Option<LineCache>,
    scratch: Vec<u8>,
}

impl std::fmt::Debug for Cube {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cube")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("dims", &self.dims)
            .field("codec", &self.codec)
            .finish()
    }
}

fn core_label(attrs: &CubeAttributes, start_byte: u64, data_file: Option<&str>) -> Container {
    let mut dims = Container::new("Dimensions");
    dims.add_keyword(Keyword::new("Samples", attrs.dimensions.samples.to_string()));
    dims.add_keyword(Keyword::new("Lines", attrs.dimensions.lines.to_string()));
    dims.add_keyword(Keyword::new("Bands", attrs.dimensions.bands.to_string()));

    let mut pixels = Container::new("Pixels");
    pixels.add_keyword(Keyword::new("Type", attrs.pixel_type.as_str()));
    pixels.add_keyword(Keyword::new("ByteOrder", attrs.byte_order.as_str()));
    pixels.add_keyword(Keyword::new("Base", format!("{:?}", attrs.base)));
    pixels.add_keyword(Keyword::new("Multiplier", format!("{:?}", attrs.multiplier)));

    let mut core = Container::new("Core");
    core.add_keyword(Keyword::new("StartByte", start_byte.to_string()));
    core.add_keyword(Keyword::new("Format", "BandSequential"));
    if let Some(name) = data_file {
        core.add_keyword(Keyword::new("^DnFile", Value::quoted(name)));
    }
    core.add_group(dims);
    core.add_group(pixels);

    let mut cube = Container::new("IsisCube");
    cube.add_object(core);

    let mut root = Container::root();
    root.add_object(cube);
    root
}

fn read_core(label: &Container) -> Result<(Dimensions, PixelCodec, u64, Option<String>)> {
    let core = label.object("Core", Traverse::DepthFirst)?;
    let dims = core.group("Dimensions", Traverse::CurrentLevel)?;
    let pixels = core.group("Pixels", Traverse::CurrentLevel)?;
    let count = |name: &str| -> Result<usize> {
        let value = dims.keyword(name, Traverse::CurrentLevel)?.as_i64(0)?;
        usize::try_from(value).map_err(|_| CubeError::parse(format!("cube {name} = {value} must not be negative")))
    };
    let dimensions = Dimensions::new(count("Samples")?, count("Lines")?, count("Bands")?);
    dimensions.validate()?;

    let format = core.keyword_value("Format", Traverse::CurrentLevel)?;
    if !format.eq_ignore_ascii_case("BandSequential") {
        return Err(CubeError::user(format!("unsupported cube format '{format}'")));
    }

    let pixel_type = PixelType::from_name(pixels.keyword_value("Type", Traverse::CurrentLevel)?)?;
    let byte_order = ByteOrder::from_name(pixels.keyword_value("ByteOrder", Traverse::CurrentLevel)?)?;
    let base = pixels.keyword("Base", Traverse::CurrentLevel)?.as_f64(0)?;
    let multiplier = pixels.keyword("Multiplier", Traverse::CurrentLevel)?.as_f64(0)?;
    let start = core.keyword("StartByte", Traverse::CurrentLevel)?.as_i64(0)?;
    if start < 1 {
        return Err(CubeError::parse(format!("StartByte {start} must be >= 1")));
    }
    let dn_file = core
        .keyword_value("^DnFile", Traverse::CurrentLevel)
        .ok()
        .map(str::to_string);

    let codec = PixelCodec::new(pixel_type, byte_order).with_scaling(base, multiplier);
    [dimensions.samples, dimensions.lines, dimensions.bands, codec.width()]
        .iter()
        .try_fold(1u64, |acc, &n| acc.checked_mul(n as u64))
        .ok_or_else(|| CubeError::parse(format!("cube of {dimensions} {pixel_type} pixels overflows")))?;
    Ok((dimensions, codec, start as u64 - 1, dn_file))
}

/// Read the label text at the start of a cube or label file.
fn read_label_text(file: &mut File, path: &Path) -> Result<String> {
    let len = file.metadata().map_err(|e| CubeError::io(path, e))?.len() as usize;
    let mut chunk = 65536.min(len);
    loop {
        let mut buf = vec![0u8; chunk];
        file.seek(SeekFrom::Start(0)).map_err(|e| CubeError::io(path, e))?;
        file.read_exact(&mut buf).map_err(|e| CubeError::io(path, e))?;
        let text_end = buf.iter().position(|b| *b == 0).unwrap_or(buf.len());
        let text = String::from_utf8_lossy(&buf[..text_end]).into_owned();
        if let Some(end) = pvl::end_offset(&text) {
            return Ok(text[..end].to_string());
        }
        if text_end < buf.len() || chunk == len {
            return Err(CubeError::parse(format!("{} has no label terminated by End", path.display())));
        }
        chunk = (chunk * 2).min(len);
    }
}

impl Cube {
    /// Create a cube, filling every pixel with NULL.
    pub fn create(path: impl AsRef<Path>, attrs: &CubeAttributes) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        attrs.dimensions.validate()?;
        if attrs.multiplier == 0.0 {
            return Err(CubeError::bad_argument("pixel multiplier must be non-zero"));
        }

        let codec = PixelCodec::new(attrs.pixel_type, attrs.byte_order).with_scaling(attrs.base, attrs.multiplier);
        let (data_path, pixel_offset, dn_name) = if attrs.detached {
            let data_path = path.with_extension("dat");
            let name = data_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            (data_path, 0u64, Some(name))
        } else {
            (path.clone(), attrs.label_bytes as u64, None)
        };

        let open = |p: &Path| {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(true)
                .open(p)
                .map_err(|e| CubeError::io(p, e))
        };
        let label_file = open(&path)?;
        let data_file = if attrs.detached {
            open(&data_path)?
        } else {
            label_file.try_clone().map_err(|e| CubeError::io(&path, e))?
        };

        let label = core_label(attrs, pixel_offset + 1, dn_name.as_deref());
        let mut cube = Self {
            path,
            data_path,
            label_file,
            data_file,
            mode: AccessMode::ReadWrite,
            dims: attrs.dimensions,
            codec,
            pixel_offset,
            label_bytes: attrs.label_bytes,
            detached: attrs.detached,
            label,
            tables: Vec::new(),
            original: None,
            dirty: true,
            closed: false,
            cache: None,
            scratch: Vec::new(),
        };

        cube.fill_null()?;
        cube.commit_label()?;
        info!(
            path = %cube.path.display(),
            dims = %cube.dims,
            pixel_type = %attrs.pixel_type,
            detached = attrs.detached,
            "Created cube"
        );
        Ok(cube)
    }

    /// Create a cube and copy the label groups (everything under `IsisCube`
    /// except `Core`), tables and original label of `template`.
    pub fn create_from(path: impl AsRef<Path>, template: &Cube, attrs: &CubeAttributes) -> Result<Self> {
        let mut cube = Self::create(path, attrs)?;
        cube.propagate_from(template)?;
        Ok(cube)
    }

    /// Copy label groups, tables and original label from another cube.
    pub fn propagate_from(&mut self, template: &Cube) -> Result<()> {
        let source = template.isis_cube()?;
        let target = self.isis_cube_mut()?;
        for node in source.children() {
            match node {
                label::Node::Object(o) if o.is_named("Core") => {}
                label::Node::Object(o) => target.add_object(o.clone()),
                label::Node::Group(g) => target.set_group(g.clone()),
                label::Node::Keyword(k) => target.set_keyword(k.clone()),
            }
        }
        for table in &template.tables {
            self.put_table(table.clone())?;
        }
        if let Some(original) = &template.original {
            self.set_original_label(original.clone())?;
        }
        self.dirty = true;
        Ok(())
    }

    fn fill_null(&mut self) -> Result<()> {
        let mut line = vec![0u8; self.dims.samples * self.codec.width()];
        let nulls = vec![NULL; self.dims.samples];
        self.codec.encode(&nulls, &mut line)?;
        self.data_file
            .seek(SeekFrom::Start(self.pixel_offset))
            .map_err(|e| CubeError::io(&self.data_path, e))?;
        let mut writer = std::io::BufWriter::new(&mut self.data_file);
        for _ in 0..self.dims.lines * self.dims.bands {
            writer.write_all(&line).map_err(|e| CubeError::io(&self.data_path, e))?;
        }
        writer.flush().map_err(|e| CubeError::io(&self.data_path, e))?;
        Ok(())
    }

    /// Open an existing cube read-only with default preferences.
    pub fn open_read(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, AccessMode::Read, &Preferences::default())
    }

    /// Open an existing cube for reading and writing.
    pub fn open_read_write(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, AccessMode::ReadWrite, &Preferences::default())
    }

    /// Open an existing cube. Read-only cubes cache decoded lines within
    /// the preferences' cache budget.
    pub fn open_with(path: impl AsRef<Path>, mode: AccessMode, prefs: &Preferences) -> Result<Self> {
        let path = path.as_ref();
        let mut label_file = OpenOptions::new()
            .read(true)
            .write(mode == AccessMode::ReadWrite)
            .open(path)
            .map_err(|e| CubeError::io(path, e))?;
        let text = read_label_text(&mut label_file, path)?;
        let mut label = pvl::parse(&text).with_context(|| format!("reading label of {}", path.display()))?;
        let (dims, codec, pixel_offset, dn_file) = read_core(&label)?;

        let label_bytes = match label.object("Label", Traverse::CurrentLevel) {
            Ok(o) => {
                let bytes = o.keyword("Bytes", Traverse::CurrentLevel)?.as_i64(0)?;
                usize::try_from(bytes)
                    .map_err(|_| CubeError::parse(format!("{} has label Bytes = {}", path.display(), bytes)))?
            }
            Err(_) => pixel_offset as usize,
        };

        let (data_path, data_file, detached) = match dn_file {
            Some(name) => {
                let data_path = path.parent().map(|p| p.join(&name)).unwrap_or_else(|| PathBuf::from(&name));
                let f = OpenOptions::new()
                    .read(true)
                    .write(mode == AccessMode::ReadWrite)
                    .open(&data_path)
                    .map_err(|e| CubeError::io(&data_path, e))?;
                (data_path, f, true)
            }
            None => {
                let f = label_file.try_clone().map_err(|e| CubeError::io(path, e))?;
                (path.to_path_buf(), f, false)
            }
        };

        let mut tables = Vec::new();
        let mut original = None;
        for object in label.objects() {
            if object.is_named("Table") {
                let desc = Table::describe(object)?;
                let bytes = read_blob(&mut label_file, path, desc.start_byte, desc.bytes)?;
                let mut table = Table::from_bytes(&desc.name, desc.fields, &bytes, desc.records, desc.order)?;
                table.keywords = desc.keywords;
                tables.push(table);
            } else if object.is_named("OriginalLabel") {
                let (start, bytes, grammar) = OriginalLabel::describe(object)?;
                let blob = read_blob(&mut label_file, path, start, bytes)?;
                original = Some(OriginalLabel::new(grammar, blob));
            }
        }
        for name in ["Table", "OriginalLabel", "Label"] {
            while label.delete_object(name).is_ok() {}
        }

        let cache = match mode {
            AccessMode::Read => Some(LineCache::new(prefs.cache_size_bytes(), dims.samples)),
            AccessMode::ReadWrite => None,
        };

        debug!(path = %path.display(), dims = %dims, mode = ?mode, tables = tables.len(), "Opened cube");
        Ok(Self {
            path: path.to_path_buf(),
            data_path,
            label_file,
            data_file,
            mode,
            dims,
            codec,
            pixel_offset,
            label_bytes,
            detached,
            label,
            tables,
            original,
            dirty: false,
            closed: false,
            cache,
            scratch: Vec::new(),
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn pixel_type(&self) -> PixelType {
        self.codec.pixel_type
    }

    pub fn codec(&self) -> PixelCodec {
        self.codec
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// The whole label tree.
    pub fn label(&self) -> &Container {
        &self.label
    }

    /// Mutable label access; changes are written on commit or close.
    pub fn label_mut(&mut self) -> Result<&mut Container> {
        self.require_writable()?;
        self.dirty = true;
        Ok(&mut self.label)
    }

    pub fn isis_cube(&self) -> Result<&Container> {
        self.label.object("IsisCube", Traverse::CurrentLevel)
    }

    fn isis_cube_mut(&mut self) -> Result<&mut Container> {
        self.require_writable()?;
        self.dirty = true;
        self.label.object_mut("IsisCube", Traverse::CurrentLevel)
    }

    /// A group under `IsisCube` (e.g. `Instrument`, `BandBin`).
    pub fn group(&self, name: &str) -> Result<&Container> {
        self.isis_cube()?.group(name, Traverse::CurrentLevel)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.group(name).is_ok()
    }

    /// Add or replace a group under `IsisCube`. `Core` cannot be replaced.
    pub fn put_group(&mut self, group: Container) -> Result<()> {
        if group.is_named("Core") {
            return Err(CubeError::bad_argument("the Core object is managed by the cube"));
        }
        self.isis_cube_mut()?.set_group(group);
        Ok(())
    }

    pub fn delete_group(&mut self, name: &str) -> Result<Container> {
        self.isis_cube_mut()?.delete_group(name)
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CubeError::not_found(format!("table {} not found in {}", name, self.path.display())))
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.table(name).is_ok()
    }

    /// Attach a table, replacing any table of the same name.
    pub fn put_table(&mut self, table: Table) -> Result<()> {
        self.require_writable()?;
        match self.tables.iter_mut().find(|t| t.name.eq_ignore_ascii_case(&table.name)) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
        self.dirty = true;
        Ok(())
    }

    pub fn original_label(&self) -> Result<&OriginalLabel> {
        self.original
            .as_ref()
            .ok_or_else(|| CubeError::not_found(format!("{} has no original label", self.path.display())))
    }

    pub fn set_original_label(&mut self, original: OriginalLabel) -> Result<()> {
        self.require_writable()?;
        self.original = Some(original);
        self.dirty = true;
        Ok(())
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(LineCache::stats)
    }

    fn require_writable(&self) -> Result<()> {
        if self.closed {
            return Err(CubeError::configuration(format!("{} is closed", self.path.display())));
        }
        if self.mode != AccessMode::ReadWrite {
            return Err(CubeError::user(format!("{} is open read-only", self.path.display())));
        }
        Ok(())
    }

    // ========================================================================
    // Pixel I/O
    // ========================================================================

    fn line_offset(&self, band: usize, line: usize, sample: usize) -> u64 {
        let index = ((band - 1) * self.dims.lines + (line - 1)) * self.dims.samples + (sample - 1);
        self.pixel_offset + (index * self.codec.width()) as u64
    }

    /// Clip a buffer's sample range to the cube, as (first sample, count,
    /// offset into the buffer row).
    fn clip_samples(&self, buffer: &Buffer) -> Option<(usize, usize, usize)> {
        let (s0, _, _) = buffer.origin();
        let first = s0.max(1);
        let last = (s0 + buffer.samples() as i64 - 1).min(self.dims.samples as i64);
        if first > last {
            return None;
        }
        Some((first as usize, (last - first + 1) as usize, (first - s0) as usize))
    }

    /// Read a buffer at its origin. Positions outside the cube are NULL.
    pub fn read(&mut self, buffer: &mut Buffer) -> Result<()> {
        if self.closed {
            return Err(CubeError::configuration(format!("{} is closed", self.path.display())));
        }
        let (_, l0, b0) = buffer.origin();
        let clip = self.clip_samples(buffer);

        for b in 0..buffer.bands() {
            let band = b0 + b as i64;
            for l in 0..buffer.lines() {
                let line = l0 + l as i64;
                let inside = band >= 1
                    && band <= self.dims.bands as i64
                    && line >= 1
                    && line <= self.dims.lines as i64;
                let Some((first, count, skip)) = clip.filter(|_| inside) else {
                    buffer.row_mut(l, b).fill(NULL);
                    continue;
                };
                let (band, line) = (band as usize, line as usize);

                let row = buffer.row_mut(l, b);
                row[..skip].fill(NULL);
                row[skip + count..].fill(NULL);

                if let Some(cache) = self.cache.as_mut() {
                    if let Some(cached) = cache.get(&(band, line)) {
                        row[skip..skip + count].copy_from_slice(&cached[first - 1..first - 1 + count]);
                        continue;
                    }
                    let mut full = vec![NULL; self.dims.samples];
                    let offset = self.line_offset(band, line, 1);
                    read_decoded(&mut self.data_file, &self.data_path, &self.codec, &mut self.scratch, offset, &mut full)?;
                    row[skip..skip + count].copy_from_slice(&full[first - 1..first - 1 + count]);
                    if let Some(cache) = self.cache.as_mut() {
                        cache.insert((band, line), full);
                    }
                } else {
                    let offset = self.line_offset(band, line, first);
                    read_decoded(
                        &mut self.data_file,
                        &self.data_path,
                        &self.codec,
                        &mut self.scratch,
                        offset,
                        &mut row[skip..skip + count],
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Write a buffer at its origin. Positions outside the cube are dropped.
    pub fn write(&mut self, buffer: &Buffer) -> Result<()> {
        self.require_writable()?;
        let (_, l0, b0) = buffer.origin();
        let Some((first, count, skip)) = self.clip_samples(buffer) else {
            return Ok(());
        };

        for b in 0..buffer.bands() {
            let band = b0 + b as i64;
            if band < 1 || band > self.dims.bands as i64 {
                continue;
            }
            for l in 0..buffer.lines() {
                let line = l0 + l as i64;
                if line < 1 || line > self.dims.lines as i64 {
                    continue;
                }
                let offset = self.line_offset(band as usize, line as usize, first);
                let values = &buffer.row(l, b)[skip..skip + count];
                self.scratch.resize(count * self.codec.width(), 0);
                self.codec.encode(values, &mut self.scratch)?;
                self.data_file
                    .seek(SeekFrom::Start(offset))
                    .map_err(|e| CubeError::io(&self.data_path, e))?;
                self.data_file
                    .write_all(&self.scratch)
                    .map_err(|e| CubeError::io(&self.data_path, e))?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Label commit
    // ========================================================================

    fn data_end(&self) -> u64 {
        if self.detached {
            self.label_bytes as u64
        } else {
            self.pixel_offset + (self.dims.pixels() * self.codec.width()) as u64
        }
    }

    /// Write the label, tables and original label.
    pub fn commit_label(&mut self) -> Result<()> {
        self.require_writable()?;

        let mut label = self.label.clone();
        let mut blobs: Vec<Vec<u8>> = Vec::new();
        let mut cursor = self.data_end();

        let mut label_object = Container::new("Label");
        label_object.add_keyword(Keyword::new("Bytes", self.label_bytes.to_string()));
        label.add_object(label_object);

        for table in &self.tables {
            let bytes = table.to_bytes(self.codec.byte_order);
            label.add_object(table.to_label_object(cursor + 1, bytes.len(), self.codec.byte_order));
            cursor += bytes.len() as u64;
            blobs.push(bytes);
        }
        if let Some(original) = &self.original {
            label.add_object(original.to_label_object(cursor + 1));
            cursor += original.bytes.len() as u64;
            blobs.push(original.bytes.clone());
        }

        let text = pvl::emit(&label);
        if text.len() > self.label_bytes {
            return Err(CubeError::user(format!(
                "label of {} needs {} bytes but only {} are reserved",
                self.path.display(),
                text.len(),
                self.label_bytes
            )));
        }

        let mut area = text.into_bytes();
        area.resize(self.label_bytes, 0);
        let data_end = self.data_end();
        let io = |e| CubeError::io(&self.path, e);
        self.label_file.seek(SeekFrom::Start(0)).map_err(io)?;
        self.label_file.write_all(&area).map_err(io)?;
        self.label_file.seek(SeekFrom::Start(data_end)).map_err(io)?;
        for blob in &blobs {
            self.label_file.write_all(blob).map_err(io)?;
        }
        self.label_file.set_len(cursor).map_err(io)?;
        self.label_file.flush().map_err(io)?;

        self.dirty = false;
        debug!(path = %self.path.display(), tables = self.tables.len(), "Committed cube label");
        Ok(())
    }

    /// Flush label changes and close. Read-only cubes just release the file.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.mode == AccessMode::ReadWrite {
            if self.dirty {
                self.commit_label()?;
            }
            self.data_file.sync_all().map_err(|e| CubeError::io(&self.data_path, e))?;
        }
        self.closed = true;
        Ok(())
    }

    /// Flush without closing.
    pub fn flush(&mut self) -> Result<()> {
        if self.mode == AccessMode::ReadWrite && self.dirty && !self.closed {
            self.commit_label()?;
        }
        Ok(())
    }
}

impl Drop for Cube {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            warn!(path = %self.path.display(), error = %e, "Failed to flush cube on drop");
        }
    }
}

fn read_blob(file: &mut File, path: &Path, start_byte: u64, bytes: usize) -> Result<Vec<u8>> {
    if start_byte < 1 {
        return Err(CubeError::parse(format!("blob StartByte {start_byte} must be >= 1")));
    }
    let mut buf = vec![0u8; bytes];
    file.seek(SeekFrom::Start(start_byte - 1)).map_err(|e| CubeError::io(path, e))?;
    file.read_exact(&mut buf).map_err(|e| CubeError::io(path, e))?;
    Ok(buf)
}

fn read_decoded(
    file: &mut File,
    path: &Path,
    codec: &PixelCodec,
    scratch: &mut Vec<u8>,
    offset: u64,
    out: &mut [f64],
) -> Result<()> {
    scratch.resize(out.len() * codec.width(), 0);
    file.seek(SeekFrom::Start(offset)).map_err(|e| CubeError::io(path, e))?;
    file.read_exact(scratch).map_err(|e| CubeError::io(path, e))?;
    codec.decode(scratch, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::special::{is_null, HIS};
    use tempfile::TempDir;

    fn attrs(s: usize, l: usize, b: usize, t: PixelType) -> CubeAttributes {
        CubeAttributes::new(Dimensions::new(s, l, b), t).with_label_bytes(8192)
    }

    #[test]
    fn test_create_write_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pattern.cub");
        let mut cube = Cube::create(&path, &attrs(5, 4, 2, PixelType::SignedWord)).unwrap();

        let mut buf = Buffer::with_origin(Dimensions::new(5, 1, 1), 1, 3, 2);
        for (i, v) in buf.data_mut().iter_mut().enumerate() {
            *v = i as f64 * 10.0;
        }
        buf[4] = HIS;
        cube.write(&buf).unwrap();
        cube.close().unwrap();

        let mut cube = Cube::open_read(&path).unwrap();
        assert_eq!(cube.dimensions(), Dimensions::new(5, 4, 2));
        let mut back = Buffer::with_origin(Dimensions::new(5, 1, 1), 1, 3, 2);
        cube.read(&mut back).unwrap();
        assert_eq!(&back.data()[..4], &[0.0, 10.0, 20.0, 30.0]);
        assert_eq!(back[4].to_bits(), HIS.to_bits());

        let mut untouched = Buffer::with_origin(Dimensions::new(5, 1, 1), 1, 1, 1);
        cube.read(&mut untouched).unwrap();
        assert!(untouched.data().iter().all(|v| is_null(*v)));
    }

    #[test]
    fn test_read_outside_fills_null() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("edge.cub");
        let mut cube = Cube::create(&path, &attrs(3, 3, 1, PixelType::Real)).unwrap();
        let mut all = Buffer::new(Dimensions::new(3, 3, 1));
        all.fill(7.0);
        cube.write(&all).unwrap();

        let mut tile = Buffer::with_origin(Dimensions::new(2, 2, 2), 3, 0, 1);
        cube.read(&mut tile).unwrap();
        assert!(is_null(tile.get(0, 0, 0)));
        assert_eq!(tile.get(0, 1, 0), 7.0);
        assert!(is_null(tile.get(1, 1, 0)));
        assert!(is_null(tile.get(0, 1, 1)));
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ro.cub");
        Cube::create(&path, &attrs(2, 2, 1, PixelType::UnsignedByte)).unwrap().close().unwrap();

        let mut cube = Cube::open_read(&path).unwrap();
        let err = cube.write(&Buffer::new(Dimensions::new(2, 2, 1))).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::User);
        assert!(cube.put_group(Container::new("Instrument")).is_err());
    }

    #[test]
    fn test_label_overflow_is_user_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small.cub");
        let mut cube = Cube::create(&path, &attrs(2, 2, 1, PixelType::Real).with_label_bytes(1024)).unwrap();
        let mut group = Container::new("Huge");
        for i in 0..200 {
            group.add_keyword(Keyword::new(format!("Key{i}"), "a fairly long value"));
        }
        cube.put_group(group).unwrap();
        let err = cube.commit_label().unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::User);
        cube.delete_group("Huge").unwrap();
        cube.close().unwrap();
    }

    #[test]
    fn test_negative_label_dimension_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("neg.cub");
        Cube::create(&path, &attrs(3, 7, 1, PixelType::Real)).unwrap().close().unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        let mut text = String::from_utf8_lossy(&bytes[..8192]).into_owned();
        let at = text.find("Lines").unwrap();
        let eq = at + text[at..].find('=').unwrap();
        text.insert(eq + 2, '-');
        bytes[..8192].copy_from_slice(&text.as_bytes()[..8192]);
        std::fs::write(&path, bytes).unwrap();

        let err = Cube::open_read(&path).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::Parse);
        assert!(err.to_string().contains("Lines"));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let dir = TempDir::new().unwrap();
        let err = Cube::create(dir.path().join("z.cub"), &attrs(4, 0, 1, PixelType::Real)).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::BadArgument);
    }
}
