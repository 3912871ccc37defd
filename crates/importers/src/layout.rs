//! Byte layout of a foreign image.

use cube_common::{ByteOrder, CubeError, FloatFormat, PixelType, Result, SpecialRanges};
use cube_store::Dimensions;
use std::path::Path;

/// Band storage organization of a foreign image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Organization {
    /// All lines of band 1, then band 2, ...
    Bsq,
    /// Each line holds every band in turn.
    Bil,
    /// Each pixel holds every band in turn.
    Bip,
}

impl Organization {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "BSQ" | "BAND_SEQUENTIAL" => Ok(Self::Bsq),
            "BIL" | "LINE_INTERLEAVED" | "BAND_INTERLEAVED_BY_LINE" => Ok(Self::Bil),
            "BIP" | "SAMPLE_INTERLEAVED" | "BAND_INTERLEAVED_BY_PIXEL" => Ok(Self::Bip),
            other => Err(CubeError::user(format!("unknown storage organization [{other}]"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bsq => "BSQ",
            Self::Bil => "BIL",
            Self::Bip => "BIP",
        }
    }
}

/// Everything needed to read pixels out of a foreign file.
///
/// Line prefix/suffix bytes surround every stored record: each band-line
/// for BSQ and BIL, each full line for BIP. The data header and trailer
/// wrap each band for BSQ and the whole image otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportLayout {
    pub dimensions: Dimensions,
    pub pixel_type: PixelType,
    pub byte_order: ByteOrder,
    pub float_format: FloatFormat,
    pub organization: Organization,
    pub file_header_bytes: u64,
    pub data_header_bytes: u64,
    pub data_trailer_bytes: u64,
    pub prefix_bytes: usize,
    pub suffix_bytes: usize,
    /// One value for all bands or one per band.
    pub base: Vec<f64>,
    pub multiplier: Vec<f64>,
    pub specials: SpecialRanges,
    pub save_prefix: bool,
    pub save_suffix: bool,
}

impl ImportLayout {
    pub fn new(dimensions: Dimensions, pixel_type: PixelType, byte_order: ByteOrder) -> Self {
        Self {
            dimensions,
            pixel_type,
            byte_order,
            float_format: FloatFormat::Ieee,
            organization: Organization::Bsq,
            file_header_bytes: 0,
            data_header_bytes: 0,
            data_trailer_bytes: 0,
            prefix_bytes: 0,
            suffix_bytes: 0,
            base: vec![0.0],
            multiplier: vec![1.0],
            specials: SpecialRanges::new(),
            save_prefix: false,
            save_suffix: false,
        }
    }

    pub fn with_organization(mut self, organization: Organization) -> Self {
        self.organization = organization;
        self
    }

    pub fn with_float_format(mut self, format: FloatFormat) -> Self {
        self.float_format = format;
        self
    }

    pub fn with_file_header(mut self, bytes: u64) -> Self {
        self.file_header_bytes = bytes;
        self
    }

    pub fn with_data_header(mut self, bytes: u64) -> Self {
        self.data_header_bytes = bytes;
        self
    }

    pub fn with_data_trailer(mut self, bytes: u64) -> Self {
        self.data_trailer_bytes = bytes;
        self
    }

    pub fn with_prefix(mut self, bytes: usize, save: bool) -> Self {
        self.prefix_bytes = bytes;
        self.save_prefix = save && bytes > 0;
        self
    }

    pub fn with_suffix(mut self, bytes: usize, save: bool) -> Self {
        self.suffix_bytes = bytes;
        self.save_suffix = save && bytes > 0;
        self
    }

    pub fn with_scaling(mut self, base: f64, multiplier: f64) -> Self {
        self.base = vec![base];
        self.multiplier = vec![multiplier];
        self
    }

    pub fn with_band_scaling(mut self, base: Vec<f64>, multiplier: Vec<f64>) -> Self {
        self.base = base;
        self.multiplier = multiplier;
        self
    }

    pub fn with_specials(mut self, specials: SpecialRanges) -> Self {
        self.specials = specials;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.dimensions.validate()?;
        let bands = self.dimensions.bands;
        for (what, values) in [("base", &self.base), ("multiplier", &self.multiplier)] {
            if values.len() != 1 && values.len() != bands {
                return Err(CubeError::user(format!(
                    "{} {} values given for {} bands",
                    values.len(),
                    what,
                    bands
                )));
            }
        }
        if self.organization == Organization::Bip && self.data_trailer_bytes > 0 && bands > 1 {
            return Err(CubeError::user("BIP images cannot declare per-band data trailers"));
        }
        self.specials.validate()
    }

    /// `(base, multiplier)` of a 0-based band.
    pub fn scaling(&self, band: usize) -> (f64, f64) {
        let pick = |v: &[f64]| if v.len() == 1 { v[0] } else { v[band] };
        (pick(&self.base), pick(&self.multiplier))
    }

    /// Whether any scaling differs between bands.
    pub fn has_band_scaling(&self) -> bool {
        self.base.len() > 1 || self.multiplier.len() > 1
    }

    /// Bytes of pixel data in one stored record.
    pub fn record_data_bytes(&self) -> u64 {
        let samples = self.dimensions.samples as u64 * self.pixel_type.size() as u64;
        match self.organization {
            Organization::Bip => samples * self.dimensions.bands as u64,
            Organization::Bsq | Organization::Bil => samples,
        }
    }

    /// Bytes of one record including its prefix and suffix.
    pub fn record_bytes(&self) -> u64 {
        self.prefix_bytes as u64 + self.record_data_bytes() + self.suffix_bytes as u64
    }

    fn band_block_bytes(&self) -> u64 {
        self.data_header_bytes + self.dimensions.lines as u64 * self.record_bytes() + self.data_trailer_bytes
    }

    /// Offset of the start (prefix) of the record holding 0-based
    /// `(line, band)`. For BIP the band is ignored.
    pub fn record_offset(&self, line: usize, band: usize) -> u64 {
        let line = line as u64;
        let band = band as u64;
        match self.organization {
            Organization::Bsq => {
                self.file_header_bytes
                    + band * self.band_block_bytes()
                    + self.data_header_bytes
                    + line * self.record_bytes()
            }
            Organization::Bil => {
                self.file_header_bytes
                    + self.data_header_bytes
                    + (line * self.dimensions.bands as u64 + band) * self.record_bytes()
            }
            Organization::Bip => self.file_header_bytes + self.data_header_bytes + line * self.record_bytes(),
        }
    }

    /// Total bytes the layout covers, from the start of the file, or
    /// `None` when that does not fit in a `u64`.
    pub fn checked_total_bytes(&self) -> Option<u64> {
        let samples = u64::try_from(self.dimensions.samples).ok()?;
        let lines = u64::try_from(self.dimensions.lines).ok()?;
        let bands = u64::try_from(self.dimensions.bands).ok()?;

        let mut data = samples.checked_mul(self.pixel_type.size() as u64)?;
        if self.organization == Organization::Bip {
            data = data.checked_mul(bands)?;
        }
        let record = data
            .checked_add(self.prefix_bytes as u64)?
            .checked_add(self.suffix_bytes as u64)?;
        let wrapped = |body: u64| {
            body.checked_add(self.data_header_bytes)?
                .checked_add(self.data_trailer_bytes)
        };
        let body = match self.organization {
            Organization::Bsq => bands.checked_mul(wrapped(lines.checked_mul(record)?)?)?,
            Organization::Bil => wrapped(lines.checked_mul(bands)?.checked_mul(record)?)?,
            Organization::Bip => wrapped(lines.checked_mul(record)?)?,
        };
        body.checked_add(self.file_header_bytes)
    }

    pub fn total_bytes(&self) -> u64 {
        self.checked_total_bytes().unwrap_or(u64::MAX)
    }

    /// Fail unless `available` bytes of `name` hold the whole layout.
    pub fn check_extent(&self, available: u64, name: &Path) -> Result<()> {
        match self.checked_total_bytes() {
            Some(needed) if needed <= available => Ok(()),
            Some(needed) => Err(CubeError::user(format!(
                "{} holds {} bytes but a {} {} image needs {}",
                name.display(),
                available,
                self.dimensions,
                self.pixel_type,
                needed
            ))),
            None => Err(CubeError::parse(format!(
                "{} image of {} overflows the addressable file size",
                self.dimensions,
                name.display()
            ))),
        }
    }

    /// Records that carry prefix/suffix bytes, as 0-based `(line, band)`
    /// in file order.
    pub fn records(&self) -> Vec<(usize, usize)> {
        let (nl, nb) = (self.dimensions.lines, self.dimensions.bands);
        match self.organization {
            Organization::Bsq => (0..nb).flat_map(|b| (0..nl).map(move |l| (l, b))).collect(),
            Organization::Bil => (0..nl).flat_map(|l| (0..nb).map(move |b| (l, b))).collect(),
            Organization::Bip => (0..nl).map(|l| (l, 0)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(org: Organization) -> ImportLayout {
        ImportLayout::new(Dimensions::new(4, 3, 2), PixelType::SignedWord, ByteOrder::Msb)
            .with_organization(org)
            .with_file_header(100)
            .with_prefix(2, true)
            .with_suffix(6, false)
    }

    #[test]
    fn test_record_offsets() {
        // record = 2 + 8 + 6 = 16 bytes
        let bsq = layout(Organization::Bsq).with_data_header(10);
        assert_eq!(bsq.record_bytes(), 16);
        assert_eq!(bsq.record_offset(0, 0), 110);
        assert_eq!(bsq.record_offset(2, 1), 100 + (10 + 48) + 10 + 32);

        let bil = layout(Organization::Bil);
        assert_eq!(bil.record_offset(1, 1), 100 + 3 * 16);

        let bip = layout(Organization::Bip);
        assert_eq!(bip.record_bytes(), 2 + 16 + 6);
        assert_eq!(bip.record_offset(2, 1), 100 + 2 * 24);
        assert_eq!(bip.total_bytes(), 100 + 3 * 24);
        assert_eq!(bip.records().len(), 3);
    }

    #[test]
    fn test_extent_checks() {
        let bsq = layout(Organization::Bsq).with_data_header(10);
        let needed = bsq.total_bytes();
        assert_eq!(needed, 100 + 2 * (10 + 3 * 16));
        bsq.check_extent(needed, Path::new("image.img")).unwrap();
        let err = bsq.check_extent(needed - 1, Path::new("image.img")).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::User);

        let huge = ImportLayout::new(
            Dimensions::new(usize::MAX / 2, 4, 1),
            PixelType::Double,
            ByteOrder::Lsb,
        );
        assert_eq!(huge.checked_total_bytes(), None);
        let err = huge.check_extent(u64::MAX, Path::new("huge.img")).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::Parse);
    }

    #[test]
    fn test_band_scaling_validation() {
        let ok = layout(Organization::Bsq).with_band_scaling(vec![0.0, 1.0], vec![1.0, 2.0]);
        ok.validate().unwrap();
        assert_eq!(ok.scaling(1), (1.0, 2.0));
        let bad = layout(Organization::Bsq).with_band_scaling(vec![0.0; 3], vec![1.0]);
        assert_eq!(bad.validate().unwrap_err().kind(), cube_common::ErrorKind::User);
    }

    #[test]
    fn test_organization_names() {
        assert_eq!(Organization::from_name("band_sequential").unwrap(), Organization::Bsq);
        assert_eq!(Organization::from_name("SAMPLE_INTERLEAVED").unwrap(), Organization::Bip);
        assert!(Organization::from_name("ZIGZAG").is_err());
    }
}
