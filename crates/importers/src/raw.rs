//! Reading pixels out of a foreign file according to an [`ImportLayout`].

use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use cube_common::special::NULL;
use cube_common::{CubeError, PixelCodec, Result};
use cube_store::{Buffer, Dimensions, FieldDef, FieldType, FieldValue, Table};
use label::Keyword;
use pipeline::io::clip;
use pipeline::TileSource;

use crate::layout::{ImportLayout, Organization};

/// A tile source over raw foreign pixels.
///
/// Raw values are tested against the layout's special ranges first;
/// anything left is scaled by the band's multiplier and base. NaN and
/// infinities become NULL.
pub struct RawImageSource<R> {
    reader: R,
    name: PathBuf,
    layout: ImportLayout,
    codec: PixelCodec,
    scratch: Vec<u8>,
}

impl<R: Read + Seek> RawImageSource<R> {
    /// Fails when the stream is shorter than the layout.
    pub fn new(mut reader: R, layout: ImportLayout, name: impl Into<PathBuf>) -> Result<Self> {
        let name = name.into();
        layout.validate()?;
        let available = reader.seek(SeekFrom::End(0)).map_err(|e| CubeError::io(&name, e))?;
        layout.check_extent(available, &name)?;
        let codec =
            PixelCodec::new(layout.pixel_type, layout.byte_order).with_float_format(layout.float_format);
        Ok(Self {
            reader,
            name,
            layout,
            codec,
            scratch: Vec::new(),
        })
    }

    pub fn layout(&self) -> &ImportLayout {
        &self.layout
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_at(&mut self, offset: u64, len: usize) -> Result<()> {
        self.scratch.resize(len, 0);
        self.reader
            .seek(SeekFrom::Start(offset))
            .map_err(|e| CubeError::io(&self.name, e))?;
        self.reader
            .read_exact(&mut self.scratch)
            .map_err(|e| CubeError::io(&self.name, e))
    }

    /// Canonical value of one raw pixel of 0-based `band`.
    pub fn convert(&self, raw: f64, band: usize) -> f64 {
        if !raw.is_finite() {
            return NULL;
        }
        if let Some(class) = self.layout.specials.test(raw) {
            return class.value();
        }
        let (base, multiplier) = self.layout.scaling(band);
        raw * multiplier + base
    }

    /// Line prefix and suffix bytes of every record, in file order.
    pub fn read_sideplanes(&mut self) -> Result<Sideplanes> {
        let mut planes = Sideplanes::default();
        let prefix = self.layout.prefix_bytes;
        let suffix = self.layout.suffix_bytes;
        let data = self.layout.record_data_bytes();
        for (line, band) in self.layout.records() {
            let start = self.layout.record_offset(line, band);
            if prefix > 0 {
                self.read_at(start, prefix)?;
                planes.prefix.push(self.scratch.clone());
            }
            if suffix > 0 {
                self.read_at(start + prefix as u64 + data, suffix)?;
                planes.suffix.push(self.scratch.clone());
            }
        }
        Ok(planes)
    }
}

impl<R: Read + Seek> TileSource for RawImageSource<R> {
    fn dimensions(&self) -> Dimensions {
        self.layout.dimensions
    }

    fn read_tile(&mut self, buffer: &mut Buffer) -> Result<()> {
        buffer.fill_null();
        let Some(((s0, s1), (l0, l1), (b0, b1))) = clip(buffer, self.layout.dimensions) else {
            return Ok(());
        };
        let (bs, bl, bb) = buffer.origin();
        let width = self.codec.width();
        let count = (s1 - s0 + 1) as usize;
        let bands = self.layout.dimensions.bands;
        let prefix = self.layout.prefix_bytes as u64;

        for band in b0..=b1 {
            let b = (band - 1) as usize;
            for line in l0..=l1 {
                let start = self.layout.record_offset((line - 1) as usize, b) + prefix;
                let (offset, len, stride, skip) = match self.layout.organization {
                    Organization::Bsq | Organization::Bil => {
                        (start + (s0 - 1) as u64 * width as u64, count * width, width, 0)
                    }
                    Organization::Bip => (
                        start + (s0 - 1) as u64 * (bands * width) as u64,
                        count * bands * width,
                        bands * width,
                        b * width,
                    ),
                };
                self.read_at(offset, len)?;
                for i in 0..count {
                    let at = i * stride + skip;
                    let raw = self.codec.read_raw(&self.scratch[at..at + width]);
                    let value = self.convert(raw, b);
                    buffer.set(
                        (s0 + i as i64 - bs) as usize,
                        (line - bl) as usize,
                        (band - bb) as usize,
                        value,
                    );
                }
            }
        }
        Ok(())
    }
}

/// Bytes around the image records, one entry per record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sideplanes {
    pub prefix: Vec<Vec<u8>>,
    pub suffix: Vec<Vec<u8>>,
}

impl Sideplanes {
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.suffix.is_empty()
    }

    /// `DataPrefix`/`DataSuffix` tables for the requested planes.
    pub fn to_tables(&self, layout: &ImportLayout) -> Result<Vec<Table>> {
        let mut tables = Vec::new();
        if layout.save_prefix {
            tables.push(plane_table("DataPrefix", &self.prefix, layout)?);
        }
        if layout.save_suffix {
            tables.push(plane_table("DataSuffix", &self.suffix, layout)?);
        }
        Ok(tables)
    }
}

fn plane_table(name: &str, records: &[Vec<u8>], layout: &ImportLayout) -> Result<Table> {
    let width = records.first().map_or(0, Vec::len);
    let mut table = Table::new(name, vec![FieldDef::new("Bytes", FieldType::Byte, width)]);
    table.keywords.push(Keyword::new("Association", "Lines"));
    table
        .keywords
        .push(Keyword::new("Organization", layout.organization.as_str()));
    for record in records {
        table.add_record(vec![FieldValue::Byte(record.clone())])?;
    }
    Ok(table)
}
