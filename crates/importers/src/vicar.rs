//! VICAR images.

use cube_common::{ByteOrder, CubeError, FloatFormat, PixelType, Result};
use cube_store::{Dimensions, LabelGrammar, OriginalLabel};
use label::{vicar, Container, Traverse};

use crate::detect::ForeignFormat;
use crate::foreign::{checked_product, optional_count, optional_int, required, required_count, DataLocation, ForeignImage};
use crate::layout::{ImportLayout, Organization};

/// Pixel type of a VICAR `FORMAT`.
pub fn format_type(format: &str) -> Result<PixelType> {
    match format.trim().to_ascii_uppercase().as_str() {
        "BYTE" => Ok(PixelType::UnsignedByte),
        "HALF" | "WORD" => Ok(PixelType::SignedWord),
        "FULL" | "LONG" => Ok(PixelType::SignedInteger),
        "REAL" => Ok(PixelType::Real),
        "DOUB" => Ok(PixelType::Double),
        other => Err(CubeError::unsupported_pixel_type(format!("VICAR FORMAT {other}"))),
    }
}

fn text_or<'a>(label: &'a Container, name: &str, default: &'a str) -> &'a str {
    label.keyword_value(name, Traverse::CurrentLevel).unwrap_or(default)
}

/// Byte order and float format from `INTFMT`/`REALFMT`.
fn encoding(label: &Container, pixel_type: PixelType) -> Result<(ByteOrder, FloatFormat)> {
    if pixel_type.is_integer() {
        return match text_or(label, "INTFMT", "LOW").to_ascii_uppercase().as_str() {
            "HIGH" => Ok((ByteOrder::Msb, FloatFormat::Ieee)),
            "LOW" => Ok((ByteOrder::Lsb, FloatFormat::Ieee)),
            other => Err(CubeError::user(format!("unknown VICAR INTFMT {other}"))),
        };
    }
    match text_or(label, "REALFMT", "VAX").to_ascii_uppercase().as_str() {
        "IEEE" => Ok((ByteOrder::Msb, FloatFormat::Ieee)),
        "RIEEE" => Ok((ByteOrder::Lsb, FloatFormat::Ieee)),
        "VAX" => Ok((ByteOrder::Lsb, FloatFormat::Vax)),
        other => Err(CubeError::user(format!("unknown VICAR REALFMT {other}"))),
    }
}

fn label_text(bytes: &[u8], start: usize, what: &str) -> Result<(String, usize)> {
    let head = String::from_utf8_lossy(&bytes[start..bytes.len().min(start + 64)]).into_owned();
    let size = head
        .strip_prefix("LBLSIZE=")
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| CubeError::parse(format!("{what} does not start with LBLSIZE")))?;
    let end = start.saturating_add(size).min(bytes.len());
    let text = String::from_utf8_lossy(&bytes[start..end]);
    let text = text.split('\0').next().unwrap_or("").trim_end().to_string();
    Ok((text, size))
}

/// Describe the image of a VICAR file, merging any end-of-dataset label.
pub fn read_header(bytes: &[u8]) -> Result<ForeignImage> {
    let (text, lblsize) = label_text(bytes, 0, "VICAR file")?;
    let mut label = vicar::parse(&text)?;

    let pixel_type = format_type(required(&label, "FORMAT")?)?;
    let (byte_order, float_format) = encoding(&label, pixel_type)?;
    let organization = Organization::from_name(text_or(&label, "ORG", "BSQ"))?;
    let dimensions = Dimensions::new(
        required_count(&label, "NS")?,
        required_count(&label, "NL")?,
        optional_count(&label, "NB", 1)?,
    );
    let recsize = required_count(&label, "RECSIZE")?;
    let nbb = optional_count(&label, "NBB", 0)?;
    let nlb = optional_count(&label, "NLB", 0)?;

    let interleaved = match organization {
        Organization::Bip => dimensions.bands,
        Organization::Bsq | Organization::Bil => 1,
    };
    let used = checked_product(&[dimensions.samples, interleaved, pixel_type.size()], "VICAR record size")?
        .checked_add(nbb)
        .ok_or_else(|| CubeError::parse("VICAR record size overflows"))?;
    if recsize < used {
        return Err(CubeError::user(format!(
            "VICAR RECSIZE {recsize} is smaller than the {used} bytes each record needs"
        )));
    }
    let data_start = checked_product(&[nlb, recsize], "VICAR binary header size")?
        .checked_add(lblsize)
        .ok_or_else(|| CubeError::parse("VICAR binary header size overflows"))?;

    let mut layout = ImportLayout::new(dimensions, pixel_type, byte_order)
        .with_float_format(float_format)
        .with_organization(organization)
        .with_file_header(data_start as u64)
        .with_prefix(nbb, true);
    layout = layout.with_suffix(recsize - used, false);

    let mut original = text.clone();
    if optional_int(&label, "EOL")?.unwrap_or(0) == 1 {
        let records = match organization {
            Organization::Bip => dimensions.lines,
            Organization::Bsq | Organization::Bil => dimensions.lines.saturating_mul(dimensions.bands),
        };
        let eol_start = records.saturating_mul(recsize).saturating_add(data_start);
        if eol_start >= bytes.len() {
            return Err(CubeError::user(format!(
                "VICAR end-of-dataset label at byte {eol_start} lies past the end of the file"
            )));
        }
        let (eol_text, _) = label_text(bytes, eol_start, "VICAR end-of-dataset label")?;
        let eol = vicar::parse(&eol_text)?;
        tracing::debug!(offset = eol_start, bytes = eol_text.len(), "Merging VICAR end-of-dataset label");
        label.merge_from(&eol);
        original.push_str("  ");
        original.push_str(&eol_text);
    }

    Ok(ForeignImage {
        format: ForeignFormat::Vicar,
        layout,
        data: DataLocation::Attached,
        original: OriginalLabel::new(LabelGrammar::Vicar, original.into_bytes()),
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::vicar_bytes;

    #[test]
    fn test_half_bil_with_binary_prefix() {
        let bytes = vicar_bytes("HALF", "BIL", (4, 2, 3), 2, "", &[0u8; 2 * 3 * (2 + 8)]);
        let image = read_header(&bytes).unwrap();
        let layout = &image.layout;
        assert_eq!(layout.dimensions, Dimensions::new(4, 2, 3));
        assert_eq!(layout.organization, Organization::Bil);
        assert_eq!((layout.pixel_type, layout.byte_order), (PixelType::SignedWord, ByteOrder::Msb));
        assert_eq!(layout.prefix_bytes, 2);
        assert_eq!(layout.suffix_bytes, 0);
        assert_eq!(layout.file_header_bytes % 10, 0);
        assert!(image.original.text().starts_with("LBLSIZE="));
    }

    #[test]
    fn test_end_of_dataset_label_is_merged() {
        let mut bytes = vicar_bytes("BYTE", "BSQ", (8, 2, 1), 0, "EXTRA='MAIN'", &[7u8; 16]);
        // The main label says EOL=0 from the builder; flip it.
        let text = String::from_utf8_lossy(&bytes).replace("EOL=0", "EOL=1");
        bytes = text.into_bytes();
        let eol = "LBLSIZE=40  PROPERTY='LATE'  TARGET='IO'";
        let mut eol_bytes = eol.as_bytes().to_vec();
        eol_bytes.resize(40, 0);
        bytes.extend(eol_bytes);

        let image = read_header(&bytes).unwrap();
        assert_eq!(image.label.keyword_value("TARGET", Traverse::DepthFirst).unwrap(), "IO");
        assert_eq!(image.label.keyword_value("EXTRA", Traverse::CurrentLevel).unwrap(), "MAIN");
        assert!(image.original.parse().unwrap().has_group("LATE", Traverse::CurrentLevel));
    }

    #[test]
    fn test_negative_and_oversized_sizes_are_rejected() {
        let bytes = vicar_bytes("BYTE", "BSQ", (4, 2, 1), 0, "", &[0u8; 8]);
        let text = String::from_utf8_lossy(&bytes).replacen("NL=2", "NL=-2", 1).replacen("  N4=0", "", 1);
        let err = read_header(text.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::Parse);
        assert!(err.to_string().contains("NL"));

        let text = String::from_utf8_lossy(&bytes)
            .replacen("NS=4", "NS=4611686018427387904", 1)
            .replacen("  HOST='JAVA'", "", 1)
            .replacen("  BUFSIZ=20480", "", 1);
        let err = read_header(text.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::User);
        assert!(err.to_string().contains("RECSIZE"));
    }

    #[test]
    fn test_complex_format_is_unsupported() {
        let bytes = vicar_bytes("COMP", "BSQ", (1, 1, 1), 0, "", &[0u8; 8]);
        assert_eq!(read_header(&bytes).unwrap_err().kind(), cube_common::ErrorKind::UnsupportedPixelType);
    }
}
