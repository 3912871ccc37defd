//! The parsed description of a foreign file, shared by every format reader.

use std::path::PathBuf;

use cube_common::{CubeError, Result};
use cube_store::OriginalLabel;
use label::{Container, Traverse};

use crate::detect::ForeignFormat;
use crate::layout::ImportLayout;

/// Where the pixels of a foreign image live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLocation {
    /// In the same file as the header.
    Attached,
    /// In a separate file.
    Detached(PathBuf),
}

/// A foreign header parsed far enough to import the pixels.
#[derive(Debug, Clone)]
pub struct ForeignImage {
    pub format: ForeignFormat,
    pub layout: ImportLayout,
    pub data: DataLocation,
    /// The header bytes as found.
    pub original: OriginalLabel,
    /// Keywords handed to label translation.
    pub label: Container,
}

// ============================================================================
// Keyword helpers
// ============================================================================

pub(crate) fn required<'a>(container: &'a Container, name: &str) -> Result<&'a str> {
    container
        .keyword_value(name, Traverse::CurrentLevel)
        .map_err(|_| CubeError::user(format!("{} is missing required keyword {}", container.name, name)))
}

pub(crate) fn required_int(container: &Container, name: &str) -> Result<i64> {
    let text = required(container, name)?;
    parse_int(text).ok_or_else(|| CubeError::user(format!("{name} = {text} is not an integer")))
}

pub(crate) fn optional_int(container: &Container, name: &str) -> Result<Option<i64>> {
    match container.keyword_value(name, Traverse::CurrentLevel) {
        Ok(text) => parse_int(text)
            .map(Some)
            .ok_or_else(|| CubeError::user(format!("{name} = {text} is not an integer"))),
        Err(_) => Ok(None),
    }
}

/// A size or count keyword: a non-negative integer.
pub(crate) fn required_count(container: &Container, name: &str) -> Result<usize> {
    to_count(name, required_int(container, name)?)
}

pub(crate) fn optional_count(container: &Container, name: &str, default: usize) -> Result<usize> {
    match optional_int(container, name)? {
        Some(value) => to_count(name, value),
        None => Ok(default),
    }
}

pub(crate) fn to_count(name: &str, value: i64) -> Result<usize> {
    usize::try_from(value).map_err(|_| CubeError::parse(format!("{name} = {value} must not be negative")))
}

/// Product of header sizes; overflow is a parse error naming `what`.
pub(crate) fn checked_product(factors: &[usize], what: &str) -> Result<usize> {
    factors
        .iter()
        .try_fold(1usize, |acc, &f| acc.checked_mul(f))
        .ok_or_else(|| CubeError::parse(format!("{what} overflows ({factors:?})")))
}

pub(crate) fn optional_f64(container: &Container, name: &str) -> Result<Option<f64>> {
    match container.keyword_value(name, Traverse::CurrentLevel) {
        Ok(text) => parse_number(text)
            .map(Some)
            .ok_or_else(|| CubeError::user(format!("{name} = {text} is not a number"))),
        Err(_) => Ok(None),
    }
}

pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().filter(|v| v.fract() == 0.0).map(|v| v as i64))
}

/// Decimal numbers, FITS `D` exponents and PDS `16#...#` based integers.
pub(crate) fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Some((radix, digits)) = based_literal(text) {
        return i64::from_str_radix(digits, radix).ok().map(|v| v as f64);
    }
    text.parse::<f64>()
        .ok()
        .or_else(|| text.replace(['D', 'd'], "E").parse::<f64>().ok())
}

/// Split `16#FF7FFFFB#` into (16, "FF7FFFFB").
pub(crate) fn based_literal(text: &str) -> Option<(u32, &str)> {
    let inner = text.strip_suffix('#')?;
    let (radix, digits) = inner.split_once('#')?;
    Some((radix.parse().ok()?, digits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use label::Keyword;

    #[test]
    fn test_number_forms() {
        assert_eq!(parse_number("1.5D2"), Some(150.0));
        assert_eq!(parse_number("16#FF#"), Some(255.0));
        assert_eq!(parse_int("12.0"), Some(12));
        assert_eq!(parse_int("12.5"), None);
    }

    #[test]
    fn test_required_keyword_is_user_error() {
        let mut image = Container::new("IMAGE");
        image.add_keyword(Keyword::new("LINES", "10"));
        assert_eq!(required_int(&image, "LINES").unwrap(), 10);
        let err = required_int(&image, "LINE_SAMPLES").unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::User);
        assert_eq!(optional_f64(&image, "OFFSET").unwrap(), None);
    }

    #[test]
    fn test_counts_reject_negative_and_overflow() {
        let mut image = Container::new("IMAGE");
        image.add_keyword(Keyword::new("LINES", "-4"));
        let err = required_count(&image, "LINES").unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::Parse);
        assert_eq!(optional_count(&image, "BANDS", 1).unwrap(), 1);

        assert_eq!(checked_product(&[4, 3, 2], "image").unwrap(), 24);
        let err = checked_product(&[usize::MAX, 2], "image").unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::Parse);
    }
}
