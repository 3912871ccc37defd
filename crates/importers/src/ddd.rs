//! DDD images: a 1024-byte big-endian header followed by the pixels.

use cube_common::{ByteOrder, CubeError, PixelType, Result};
use cube_store::{Dimensions, LabelGrammar, OriginalLabel};
use label::{pvl, Container, Keyword};

use crate::detect::{ForeignFormat, DDD_MAGIC};
use crate::foreign::{DataLocation, ForeignImage};
use crate::layout::{ImportLayout, Organization};

pub const HEADER_BYTES: usize = 1024;

/// Decoded DDD header words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DddHeader {
    pub lines: u32,
    pub bytes_per_line: u32,
    pub bit_type: u32,
}

fn word(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl DddHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_BYTES {
            return Err(CubeError::parse(format!(
                "DDD header needs {HEADER_BYTES} bytes, file has {}",
                bytes.len()
            )));
        }
        let magic = word(bytes, 0);
        if magic != DDD_MAGIC {
            return Err(CubeError::parse(format!("DDD magic {magic} is not {DDD_MAGIC}")));
        }
        let header = Self {
            lines: word(bytes, 4),
            bytes_per_line: word(bytes, 8),
            bit_type: word(bytes, 28),
        };
        // The header words are signed on disk.
        for (name, value) in [("lines", header.lines), ("bytes per line", header.bytes_per_line)] {
            if i32::try_from(value).is_err() {
                return Err(CubeError::parse(format!("DDD {name} {} is negative", value as i32)));
            }
        }
        Ok(header)
    }

    /// `(pixel type, bands, organization)` for the bit type.
    pub fn pixel_layout(&self) -> Result<(PixelType, usize, Organization)> {
        match self.bit_type {
            8 => Ok((PixelType::UnsignedByte, 1, Organization::Bsq)),
            16 => Ok((PixelType::UnsignedWord, 1, Organization::Bsq)),
            32 => Ok((PixelType::Real, 1, Organization::Bsq)),
            48 => Ok((PixelType::UnsignedWord, 3, Organization::Bip)),
            other => Err(CubeError::unsupported_pixel_type(format!("DDD bit type {other}"))),
        }
    }

    pub fn samples(&self) -> usize {
        (u64::from(self.bytes_per_line) * 8 / u64::from(self.bit_type.max(1))) as usize
    }

    /// The header fields as a label.
    pub fn to_label(&self) -> Container {
        let mut root = Container::root();
        let mut header = Container::new("DddHeader");
        header.add_keyword(Keyword::new("MagicNumber", DDD_MAGIC.to_string()));
        header.add_keyword(Keyword::new("NumberOfLines", self.lines.to_string()));
        header.add_keyword(Keyword::new("NumberOfBytesPerLine", self.bytes_per_line.to_string()));
        header.add_keyword(Keyword::new("BitType", self.bit_type.to_string()));
        root.add_group(header);
        root
    }
}

/// Describe the image of a DDD file.
pub fn read_header(bytes: &[u8]) -> Result<ForeignImage> {
    let header = DddHeader::parse(bytes)?;
    let (pixel_type, bands, organization) = header.pixel_layout()?;
    let dimensions = Dimensions::new(header.samples(), header.lines as usize, bands);

    let layout = ImportLayout::new(dimensions, pixel_type, ByteOrder::Msb)
        .with_organization(organization)
        .with_file_header(HEADER_BYTES as u64);
    let label = header.to_label();
    let original = OriginalLabel::new(LabelGrammar::Pvl, pvl::emit(&label));

    Ok(ForeignImage {
        format: ForeignFormat::Ddd,
        layout,
        data: DataLocation::Attached,
        original,
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::ddd_bytes;

    #[test]
    fn test_bit_types() {
        let image = read_header(&ddd_bytes(3, 10, 16, &[])).unwrap();
        assert_eq!(image.layout.dimensions, Dimensions::new(5, 3, 1));
        assert_eq!(image.layout.pixel_type, PixelType::UnsignedWord);

        let color = read_header(&ddd_bytes(2, 12, 48, &[])).unwrap();
        assert_eq!(color.layout.dimensions, Dimensions::new(2, 2, 3));
        assert_eq!(color.layout.organization, Organization::Bip);

        let err = read_header(&ddd_bytes(2, 12, 24, &[])).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::UnsupportedPixelType);
    }

    #[test]
    fn test_negative_header_words() {
        let err = read_header(&ddd_bytes(-4i32 as u32, 10, 16, &[])).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::Parse);
        assert!(err.to_string().contains("-4"));
        let err = read_header(&ddd_bytes(3, u32::MAX, 8, &[])).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::Parse);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = ddd_bytes(1, 1, 8, &[0]);
        bytes[3] = 0;
        assert_eq!(read_header(&bytes).unwrap_err().kind(), cube_common::ErrorKind::Parse);
    }

    #[test]
    fn test_header_label_round_trips() {
        let image = read_header(&ddd_bytes(4, 4, 8, &[])).unwrap();
        let parsed = image.original.parse().unwrap();
        assert_eq!(parsed, image.label);
    }
}
