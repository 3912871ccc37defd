//! Foreign file import: header parsing, pixel copy through a session, and
//! label attachment.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use cube_common::{CubeError, PixelType, Preferences, Result, ResultExt};
use cube_store::{Cube, CubeAttributes, Dimensions};
use pipeline::{BufferShape, CancellationToken, LogProgress, ProcessSession};
use tracing::{info, warn};
use translate::{TemplateStore, Translator};

use crate::detect::{detect_format, read_input, ForeignFormat};
use crate::foreign::{DataLocation, ForeignImage};
use crate::layout::{ImportLayout, Organization};
use crate::raw::RawImageSource;
use crate::{ddd, fits, pds3, pds4, vicar};

/// Caller choices for one import.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Skip detection and read the input as this format.
    pub format: Option<ForeignFormat>,
    /// Output pixel type; the preferences' import type when unset.
    pub pixel_type: Option<PixelType>,
    /// FITS header unit to import.
    pub hdu: Option<usize>,
    /// Pixel file overriding the one a detached label names.
    pub data_file: Option<PathBuf>,
}

impl ImportOptions {
    pub fn with_format(mut self, format: ForeignFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_pixel_type(mut self, pixel_type: PixelType) -> Self {
        self.pixel_type = Some(pixel_type);
        self
    }

    pub fn with_hdu(mut self, hdu: usize) -> Self {
        self.hdu = Some(hdu);
        self
    }

    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = Some(path.into());
        self
    }
}

/// Summary of a finished import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportResult {
    pub format: ForeignFormat,
    pub dimensions: Dimensions,
    pub input_pixel_type: PixelType,
    pub output_pixel_type: PixelType,
    pub organization: Organization,
    pub tiles: usize,
    /// Label groups produced by translation.
    pub groups: Vec<String>,
    /// Sideplane tables attached to the cube.
    pub tables: Vec<String>,
}

/// Imports foreign images into cubes.
pub struct Importer<'a> {
    prefs: &'a Preferences,
    templates: TemplateStore,
    cancel: Option<CancellationToken>,
}

impl<'a> Importer<'a> {
    pub fn new(prefs: &'a Preferences, templates: TemplateStore) -> Self {
        Self {
            prefs,
            templates,
            cancel: None,
        }
    }

    /// Importer using the bundled translation templates.
    pub fn with_bundled_templates(prefs: &'a Preferences) -> Result<Self> {
        Ok(Self::new(prefs, TemplateStore::bundled()?))
    }

    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Parse a foreign header without touching its pixels. Returns the
    /// description and the (inflated) file contents.
    pub fn describe(&self, input: &Path, options: &ImportOptions) -> Result<(ForeignImage, Bytes)> {
        let bytes = read_input(input)?;
        let format = match options.format {
            Some(format) => format,
            None => detect_format(&bytes, input)
                .ok_or_else(|| CubeError::user(format!("cannot identify the format of {}", input.display())))?,
        };
        let data_file = options.data_file.as_deref();
        let image = match format {
            ForeignFormat::Fits => fits::read_header(&bytes, options.hdu),
            ForeignFormat::Pds3 => pds3::read_header(&bytes, input, data_file),
            ForeignFormat::Pds4 => pds4::read_header(&bytes, input, data_file),
            ForeignFormat::Vicar => vicar::read_header(&bytes),
            ForeignFormat::Ddd => ddd::read_header(&bytes),
            ForeignFormat::Raw => Err(CubeError::user("raw images need an explicit layout")),
        }
        .with_context(|| format!("reading {} header of {}", format, input.display()))?;
        Ok((image, bytes))
    }

    /// Import a foreign file into a new cube at `output`.
    pub fn import_file(&self, input: &Path, output: &Path, options: &ImportOptions) -> Result<ImportResult> {
        let (image, bytes) = self.describe(input, options)?;
        self.import_image(image, bytes, input, output, options)
    }

    /// Import headerless pixels described by `layout`.
    pub fn import_raw(
        &self,
        input: &Path,
        layout: ImportLayout,
        output: &Path,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        let image = ForeignImage {
            format: ForeignFormat::Raw,
            layout,
            data: DataLocation::Detached(input.to_path_buf()),
            original: cube_store::OriginalLabel::new(cube_store::LabelGrammar::Pvl, Vec::new()),
            label: label::Container::root(),
        };
        self.import_image(image, Bytes::new(), input, output, options)
    }

    fn import_image(
        &self,
        image: ForeignImage,
        bytes: Bytes,
        input: &Path,
        output: &Path,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        let result = self.write_cube(image, bytes, input, output, options);
        if result.is_err() && output.exists() {
            if let Err(e) = std::fs::remove_file(output) {
                warn!(file = %output.display(), error = %e, "Failed to remove partial import output");
            }
        }
        result
    }

    fn write_cube(
        &self,
        image: ForeignImage,
        bytes: Bytes,
        input: &Path,
        output: &Path,
        options: &ImportOptions,
    ) -> Result<ImportResult> {
        let ForeignImage {
            format,
            layout,
            data,
            original,
            label,
        } = image;
        let available = match &data {
            DataLocation::Attached => bytes.len() as u64,
            DataLocation::Detached(path) => std::fs::metadata(path).map_err(|e| CubeError::io(path, e))?.len(),
        };
        let data_name = match &data {
            DataLocation::Attached => input,
            DataLocation::Detached(path) => path.as_path(),
        };
        layout.check_extent(available, data_name)?;

        let output_type = options.pixel_type.unwrap_or(self.prefs.import_pixel_type);
        let attrs = CubeAttributes::new(layout.dimensions, output_type).with_label_bytes(self.prefs.label_bytes);
        let mut cube = Cube::create(output, &attrs)?;

        let (tiles, sideplanes) = match data {
            DataLocation::Attached => {
                let source = RawImageSource::new(Cursor::new(bytes), layout.clone(), input)?;
                self.copy_pixels(source, &mut cube, format)?
            }
            DataLocation::Detached(path) => {
                let file = File::open(&path).map_err(|e| CubeError::io(&path, e))?;
                let source = RawImageSource::new(BufReader::new(file), layout.clone(), &path)?;
                self.copy_pixels(source, &mut cube, format)?
            }
        };

        let mut tables = Vec::new();
        for table in sideplanes {
            tables.push(table.name.clone());
            cube.put_table(table)?;
        }
        if !original.bytes.is_empty() {
            cube.set_original_label(original)?;
        }

        let mut groups = Vec::new();
        if let Some(name) = format.template_name() {
            let template = self.templates.get(name)?;
            for group in Translator::translate(&label, template)? {
                groups.push(group.name.clone());
                cube.put_group(group)?;
            }
        }
        cube.close()?;

        info!(
            input = %input.display(),
            output = %output.display(),
            format = %format,
            dimensions = %layout.dimensions,
            pixel_type = %output_type,
            tiles,
            "Imported foreign image"
        );

        Ok(ImportResult {
            format,
            dimensions: layout.dimensions,
            input_pixel_type: layout.pixel_type,
            output_pixel_type: output_type,
            organization: layout.organization,
            tiles,
            groups,
            tables,
        })
    }

    fn copy_pixels<R: Read + Seek>(
        &self,
        mut source: RawImageSource<R>,
        cube: &mut Cube,
        format: ForeignFormat,
    ) -> Result<(usize, Vec<cube_store::Table>)> {
        let dims = source.layout().dimensions;
        let report = {
            let mut session = ProcessSession::new(format!("{format} import"), self.prefs);
            session.add_input(&mut source);
            session.add_output(&mut *cube);
            session.set_shape(BufferShape::line(dims));
            session.set_progress(LogProgress::new());
            if let Some(token) = &self.cancel {
                session.set_cancellation(token.clone());
            }
            session.run_mut(|inputs, outputs| outputs[0].copy_from(&inputs[0]))?
        };

        let layout = source.layout().clone();
        let tables = if layout.save_prefix || layout.save_suffix {
            source.read_sideplanes()?.to_tables(&layout)?
        } else {
            Vec::new()
        };
        Ok((report.tiles, tables))
    }
}
