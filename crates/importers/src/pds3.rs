//! PDS3 labels with `IMAGE` or `QUBE` objects.

use std::path::{Path, PathBuf};

use cube_common::{ByteOrder, CubeError, FloatFormat, PixelType, Result, SpecialPixel, SpecialRanges};
use cube_store::{Dimensions, LabelGrammar, OriginalLabel};
use label::{pvl, Container, Keyword, Traverse};

use crate::detect::ForeignFormat;
use crate::foreign::{
    based_literal, checked_product, optional_count, optional_f64, optional_int, parse_int, parse_number, required,
    required_count, required_int, to_count, DataLocation, ForeignImage,
};
use crate::layout::{ImportLayout, Organization};

/// Largest prefix of the file searched for the label's `END`.
const LABEL_WINDOW: usize = 1 << 20;

/// Where a `^IMAGE`/`^QUBE` pointer says the data starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPointer {
    pub file: Option<String>,
    /// 0-based byte offset.
    pub offset: u64,
}

/// Interpret a pointer keyword. Integers count 1-based records of
/// `record_bytes` unless the unit is `<BYTES>`.
pub fn parse_pointer(keyword: &Keyword, record_bytes: Option<u64>) -> Result<DataPointer> {
    let location = |i: usize| -> Result<u64> {
        let text = keyword.value(i)?;
        let n = parse_int(text)
            .filter(|n| *n >= 1)
            .ok_or_else(|| CubeError::user(format!("{} location {} is not a positive integer", keyword.name, text)))?
            as u64;
        let in_bytes = keyword.unit(i)?.map_or(false, |u| u.eq_ignore_ascii_case("BYTES"));
        if in_bytes {
            Ok(n - 1)
        } else {
            let record_bytes = record_bytes
                .ok_or_else(|| CubeError::user(format!("{} counts records but RECORD_BYTES is missing", keyword.name)))?;
            (n - 1).checked_mul(record_bytes).ok_or_else(|| {
                CubeError::parse(format!("{} record {} of {} bytes lies beyond any file", keyword.name, n, record_bytes))
            })
        }
    };
    match keyword.len() {
        1 => {
            let text = keyword.value(0)?;
            if parse_int(text).is_some() {
                Ok(DataPointer {
                    file: None,
                    offset: location(0)?,
                })
            } else {
                Ok(DataPointer {
                    file: Some(text.to_string()),
                    offset: 0,
                })
            }
        }
        2 => Ok(DataPointer {
            file: Some(keyword.value(0)?.to_string()),
            offset: location(1)?,
        }),
        n => Err(CubeError::user(format!("{} has {} values", keyword.name, n))),
    }
}

/// Pixel type, byte order and float format of a `SAMPLE_TYPE` or
/// `CORE_ITEM_TYPE` value at a given width in bits.
pub fn sample_type(name: &str, bits: i64) -> Result<(PixelType, ByteOrder, FloatFormat)> {
    let upper = name.trim().to_ascii_uppercase();
    let order = if upper.starts_with("PC_") || upper.starts_with("LSB_") || upper.starts_with("VAX_") {
        ByteOrder::Lsb
    } else {
        ByteOrder::Msb
    };
    let format = if upper.starts_with("VAX_") && upper.ends_with("REAL") {
        FloatFormat::Vax
    } else {
        FloatFormat::Ieee
    };
    let unsupported = || CubeError::unsupported_pixel_type(format!("{upper} with {bits} bits"));
    let pixel_type = if upper.contains("REAL") {
        match bits {
            32 => PixelType::Real,
            64 => PixelType::Double,
            _ => return Err(unsupported()),
        }
    } else if upper.contains("INTEGER") {
        let unsigned = upper.contains("UNSIGNED");
        match (bits, unsigned) {
            (8, _) => PixelType::UnsignedByte,
            (16, true) => PixelType::UnsignedWord,
            (16, false) => PixelType::SignedWord,
            (32, false) => PixelType::SignedInteger,
            _ => return Err(unsupported()),
        }
    } else {
        return Err(unsupported());
    };
    Ok((pixel_type, order, format))
}

/// A special-value keyword. `16#...#` literals on real data are bit
/// patterns of the stored float.
fn special_value(container: &Container, name: &str, pixel_type: PixelType) -> Result<Option<f64>> {
    let Ok(text) = container.keyword_value(name, Traverse::CurrentLevel) else {
        return Ok(None);
    };
    if let Some((radix, digits)) = based_literal(text.trim()) {
        let bits = u64::from_str_radix(digits, radix)
            .map_err(|_| CubeError::user(format!("{name} = {text} is not a valid literal")))?;
        return Ok(Some(match pixel_type {
            PixelType::Real => f32::from_bits(bits as u32) as f64,
            PixelType::Double => f64::from_bits(bits),
            _ => bits as f64,
        }));
    }
    parse_number(text)
        .map(Some)
        .ok_or_else(|| CubeError::user(format!("{name} = {text} is not a number")))
}

fn int_array(container: &Container, name: &str) -> Result<Vec<i64>> {
    let keyword = container
        .keyword(name, Traverse::CurrentLevel)
        .map_err(|_| CubeError::user(format!("{} is missing required keyword {}", container.name, name)))?;
    (0..keyword.len())
        .map(|i| {
            let text = keyword.value(i)?;
            parse_int(text).ok_or_else(|| CubeError::user(format!("{name} value {text} is not an integer")))
        })
        .collect()
}

fn image_layout(image: &Container) -> Result<ImportLayout> {
    let samples = required_count(image, "LINE_SAMPLES")?;
    let lines = required_count(image, "LINES")?;
    let bands = optional_count(image, "BANDS", 1)?;
    let bits = required_int(image, "SAMPLE_BITS")?;
    let (pixel_type, order, format) = sample_type(required(image, "SAMPLE_TYPE")?, bits)?;

    let organization = match image.keyword_value("BAND_STORAGE_TYPE", Traverse::CurrentLevel) {
        Ok(name) => Organization::from_name(name)?,
        Err(_) => Organization::Bsq,
    };

    let mut specials = SpecialRanges::new();
    for name in ["MISSING_CONSTANT", "NULL"] {
        if let Some(v) = special_value(image, name, pixel_type)? {
            specials = specials.with(SpecialPixel::Null, v, v);
            break;
        }
    }

    Ok(ImportLayout::new(Dimensions::new(samples, lines, bands), pixel_type, order)
        .with_float_format(format)
        .with_organization(organization)
        .with_scaling(
            optional_f64(image, "OFFSET")?.unwrap_or(0.0),
            optional_f64(image, "SCALING_FACTOR")?.unwrap_or(1.0),
        )
        .with_prefix(optional_count(image, "LINE_PREFIX_BYTES", 0)?, true)
        .with_suffix(optional_count(image, "LINE_SUFFIX_BYTES", 0)?, true)
        .with_specials(specials))
}

fn qube_layout(qube: &Container) -> Result<ImportLayout> {
    let axes: Vec<String> = {
        let keyword = qube
            .keyword("AXIS_NAME", Traverse::CurrentLevel)
            .map_err(|_| CubeError::user("QUBE is missing required keyword AXIS_NAME"))?;
        (0..keyword.len())
            .map(|i| keyword.value(i).map(|v| v.to_ascii_uppercase()))
            .collect::<Result<_>>()?
    };
    let organization = match axes.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["SAMPLE", "LINE", "BAND"] => Organization::Bsq,
        ["SAMPLE", "BAND", "LINE"] => Organization::Bil,
        ["BAND", "SAMPLE", "LINE"] => Organization::Bip,
        other => return Err(CubeError::user(format!("unsupported QUBE axis order {other:?}"))),
    };
    let position = |axis: &str| axes.iter().position(|a| a == axis).unwrap_or(0);
    let (si, li, bi) = (position("SAMPLE"), position("LINE"), position("BAND"));

    let items = int_array(qube, "CORE_ITEMS")?;
    if items.len() != 3 {
        return Err(CubeError::user(format!("CORE_ITEMS has {} values, expected 3", items.len())));
    }
    let dimensions = Dimensions::new(
        to_count("CORE_ITEMS", items[si])?,
        to_count("CORE_ITEMS", items[li])?,
        to_count("CORE_ITEMS", items[bi])?,
    );
    let bytes = required_int(qube, "CORE_ITEM_BYTES")?;
    let (pixel_type, order, format) = sample_type(required(qube, "CORE_ITEM_TYPE")?, bytes.saturating_mul(8))?;

    let suffix = match qube.keyword("SUFFIX_ITEMS", Traverse::CurrentLevel) {
        Ok(_) => int_array(qube, "SUFFIX_ITEMS")?,
        Err(_) => vec![0, 0, 0],
    };
    let suffix_bytes = optional_count(qube, "SUFFIX_BYTES", 4)?;
    let suffix_count = |index: usize| to_count("SUFFIX_ITEMS", suffix.get(index).copied().unwrap_or(0));
    let (sample_suffix, line_suffix, band_suffix) = (suffix_count(si)?, suffix_count(li)?, suffix_count(bi)?);
    if organization != Organization::Bsq && (line_suffix > 0 || band_suffix > 0) {
        return Err(CubeError::user(format!(
            "{} qubes with line or band suffix planes are not supported",
            organization.as_str()
        )));
    }

    let mut specials = SpecialRanges::new();
    for (name, class) in [
        ("CORE_NULL", SpecialPixel::Null),
        ("CORE_LOW_REPR_SATURATION", SpecialPixel::Lrs),
        ("CORE_LOW_INSTR_SATURATION", SpecialPixel::Lis),
        ("CORE_HIGH_REPR_SATURATION", SpecialPixel::Hrs),
        ("CORE_HIGH_INSTR_SATURATION", SpecialPixel::His),
    ] {
        if let Some(v) = special_value(qube, name, pixel_type)? {
            specials = specials.with(class, v, v);
        }
    }

    let record_suffix = checked_product(&[sample_suffix, suffix_bytes], "QUBE sample suffix size")?;
    let suffix_width = dimensions
        .samples
        .checked_add(sample_suffix)
        .ok_or_else(|| CubeError::parse("QUBE suffix plane width overflows"))?;
    let line_suffix_bytes = checked_product(&[line_suffix, suffix_width, suffix_bytes], "QUBE line suffix size")? as u64;
    Ok(ImportLayout::new(dimensions, pixel_type, order)
        .with_float_format(format)
        .with_organization(organization)
        .with_scaling(
            optional_f64(qube, "CORE_BASE")?.unwrap_or(0.0),
            optional_f64(qube, "CORE_MULTIPLIER")?.unwrap_or(1.0),
        )
        .with_suffix(record_suffix, true)
        .with_data_trailer(line_suffix_bytes)
        .with_specials(specials))
}

/// Resolve a detached data file next to the label, trying the name as
/// written and then in lower and upper case.
pub fn resolve_data_file(label_path: &Path, name: &str) -> Result<PathBuf> {
    let dir = label_path.parent().unwrap_or_else(|| Path::new("."));
    for candidate in [name.to_string(), name.to_ascii_lowercase(), name.to_ascii_uppercase()] {
        let path = dir.join(&candidate);
        if path.exists() {
            return Ok(path);
        }
    }
    Err(CubeError::user(format!(
        "data file {} named by {} does not exist",
        dir.join(name).display(),
        label_path.display()
    )))
}

/// Describe the image of a PDS3 product. `data_file` overrides any file
/// named by the pointer.
pub fn read_header(bytes: &[u8], label_path: &Path, data_file: Option<&Path>) -> Result<ForeignImage> {
    let window = String::from_utf8_lossy(&bytes[..bytes.len().min(LABEL_WINDOW)]);
    let label_end = pvl::end_offset(&window).unwrap_or(window.len());
    let text = &window[..label_end];
    let label = pvl::parse(text)?;

    let record_bytes = match optional_int(&label, "RECORD_BYTES")? {
        Some(value) => Some(to_count("RECORD_BYTES", value)? as u64),
        None => None,
    };
    let (pointer_name, object_name) = if label.has_keyword("^QUBE", Traverse::CurrentLevel) {
        ("^QUBE", "QUBE")
    } else if label.has_keyword("^IMAGE", Traverse::CurrentLevel) {
        ("^IMAGE", "IMAGE")
    } else {
        return Err(CubeError::user(format!("{} has no ^IMAGE or ^QUBE pointer", label_path.display())));
    };
    let pointer = parse_pointer(label.keyword(pointer_name, Traverse::CurrentLevel)?, record_bytes)?;
    let object = label
        .object(object_name, Traverse::CurrentLevel)
        .map_err(|_| CubeError::user(format!("{} has no {} object", label_path.display(), object_name)))?;

    let layout = if object_name == "QUBE" {
        qube_layout(object)?
    } else {
        image_layout(object)?
    }
    .with_file_header(pointer.offset);

    let data = match (data_file, &pointer.file) {
        (Some(path), _) => DataLocation::Detached(path.to_path_buf()),
        (None, Some(name)) => DataLocation::Detached(resolve_data_file(label_path, name)?),
        (None, None) => DataLocation::Attached,
    };

    tracing::debug!(
        object = object_name,
        offset = pointer.offset,
        organization = layout.organization.as_str(),
        "Parsed PDS3 label"
    );

    Ok(ForeignImage {
        format: ForeignFormat::Pds3,
        layout,
        data,
        original: OriginalLabel::new(LabelGrammar::Pvl, text.as_bytes().to_vec()),
        label,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use label::Value;

    #[test]
    fn test_pointer_forms() {
        let records = Keyword::new("^IMAGE", "3");
        assert_eq!(parse_pointer(&records, Some(100)).unwrap().offset, 200);

        let bytes = Keyword::new("^IMAGE", Value::with_unit("513", "BYTES"));
        assert_eq!(parse_pointer(&bytes, None).unwrap().offset, 512);

        let detached = Keyword::new("^IMAGE", Value::quoted("FRAME.IMG"));
        assert_eq!(parse_pointer(&detached, None).unwrap().file.as_deref(), Some("FRAME.IMG"));

        let both = Keyword::array("^QUBE", [Value::quoted("Q.QUB"), Value::new("2")]);
        let pointer = parse_pointer(&both, Some(512)).unwrap();
        assert_eq!((pointer.file.as_deref(), pointer.offset), (Some("Q.QUB"), 512));

        assert!(parse_pointer(&Keyword::new("^IMAGE", "2"), None).is_err());
    }

    #[test]
    fn test_sample_types() {
        assert_eq!(
            sample_type("LSB_UNSIGNED_INTEGER", 16).unwrap(),
            (PixelType::UnsignedWord, ByteOrder::Lsb, FloatFormat::Ieee)
        );
        assert_eq!(
            sample_type("VAX_REAL", 32).unwrap(),
            (PixelType::Real, ByteOrder::Lsb, FloatFormat::Vax)
        );
        assert_eq!(sample_type("MSB_INTEGER", 32).unwrap().0, PixelType::SignedInteger);
        let err = sample_type("UNSIGNED_INTEGER", 32).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::UnsupportedPixelType);
    }

    #[test]
    fn test_qube_with_sample_suffix_and_bit_pattern_null() {
        let text = "PDS_VERSION_ID = PDS3\n\
                    RECORD_BYTES = 512\n\
                    ^QUBE = 2\n\
                    OBJECT = QUBE\n\
                    \x20 AXES = 3\n\
                    \x20 AXIS_NAME = (SAMPLE, LINE, BAND)\n\
                    \x20 CORE_ITEMS = (4, 3, 2)\n\
                    \x20 CORE_ITEM_BYTES = 4\n\
                    \x20 CORE_ITEM_TYPE = SUN_REAL\n\
                    \x20 CORE_NULL = 16#FF7FFFFB#\n\
                    \x20 SUFFIX_ITEMS = (1, 0, 0)\n\
                    \x20 SUFFIX_BYTES = 4\n\
                    END_OBJECT = QUBE\n\
                    END\n";
        let image = read_header(text.as_bytes(), Path::new("q.qub"), None).unwrap();
        let layout = &image.layout;
        assert_eq!(layout.dimensions, Dimensions::new(4, 3, 2));
        assert_eq!(layout.file_header_bytes, 512);
        assert_eq!(layout.suffix_bytes, 4);
        let null = f32::from_bits(0xFF7F_FFFB) as f64;
        assert_eq!(layout.specials.null, Some((null, null)));
        assert_eq!(image.data, DataLocation::Attached);
    }

    #[test]
    fn test_negative_sizes_are_parse_errors() {
        let image = |lines: &str| {
            format!(
                "PDS_VERSION_ID = PDS3\nRECORD_BYTES = 8\n^IMAGE = 2\nOBJECT = IMAGE\n  LINES = {lines}\n  \
                 LINE_SAMPLES = 8\n  SAMPLE_BITS = 8\n  SAMPLE_TYPE = UNSIGNED_INTEGER\nEND_OBJECT = IMAGE\nEND\n"
            )
        };
        assert!(read_header(image("2").as_bytes(), Path::new("x.img"), None).is_ok());
        let err = read_header(image("-2").as_bytes(), Path::new("x.img"), None).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::Parse);
        assert!(err.to_string().contains("LINES"));

        let far = Keyword::new("^IMAGE", "9223372036854775807");
        assert_eq!(parse_pointer(&far, Some(512)).unwrap_err().kind(), cube_common::ErrorKind::Parse);
    }

    #[test]
    fn test_missing_pointer() {
        let err = read_header(b"PDS_VERSION_ID = PDS3\nEND\n", Path::new("x.lbl"), None).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::User);
    }
}
