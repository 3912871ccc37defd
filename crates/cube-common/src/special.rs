//! Special pixel sentinels and the arithmetic that honors them.
//!
//! Pixels are held in memory as `f64`. The five special classes use the
//! Double sentinel patterns (`0xFFEFFFFFFFFFFFFB..=0xFFEFFFFFFFFFFFFF`),
//! which sit just below every valid value, so classification is a single
//! comparison followed by an exact match.

use crate::error::{CubeError, Result};

/// In-memory NULL (`0xFFEFFFFFFFFFFFFB`).
pub const NULL: f64 = -1.797693134862315e308;
/// In-memory low representation saturation (`0xFFEFFFFFFFFFFFFC`).
pub const LRS: f64 = -1.7976931348623151e308;
/// In-memory low instrument saturation (`0xFFEFFFFFFFFFFFFD`).
pub const LIS: f64 = -1.7976931348623153e308;
/// In-memory high instrument saturation (`0xFFEFFFFFFFFFFFFE`).
pub const HIS: f64 = -1.7976931348623155e308;
/// In-memory high representation saturation (`0xFFEFFFFFFFFFFFFF`).
pub const HRS: f64 = -1.7976931348623157e308;

/// Smallest valid in-memory value (`0xFFEFFFFFFFFFFFFA`).
pub const VALID_MIN: f64 = -1.7976931348623147e308;

/// The five special pixel classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialPixel {
    Null,
    Lrs,
    Lis,
    His,
    Hrs,
}

impl SpecialPixel {
    pub const ALL: [SpecialPixel; 5] = [
        SpecialPixel::Null,
        SpecialPixel::Lrs,
        SpecialPixel::Lis,
        SpecialPixel::His,
        SpecialPixel::Hrs,
    ];

    /// The in-memory sentinel for this class.
    pub fn value(&self) -> f64 {
        match self {
            Self::Null => NULL,
            Self::Lrs => LRS,
            Self::Lis => LIS,
            Self::His => HIS,
            Self::Hrs => HRS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Lrs => "Lrs",
            Self::Lis => "Lis",
            Self::His => "His",
            Self::Hrs => "Hrs",
        }
    }
}

impl std::fmt::Display for SpecialPixel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify an in-memory pixel. Non-finite values are treated as NULL.
#[inline]
pub fn classify(x: f64) -> Option<SpecialPixel> {
    if !x.is_finite() {
        return Some(SpecialPixel::Null);
    }
    if x >= VALID_MIN {
        return None;
    }
    match x.to_bits() {
        0xFFEF_FFFF_FFFF_FFFB => Some(SpecialPixel::Null),
        0xFFEF_FFFF_FFFF_FFFC => Some(SpecialPixel::Lrs),
        0xFFEF_FFFF_FFFF_FFFD => Some(SpecialPixel::Lis),
        0xFFEF_FFFF_FFFF_FFFE => Some(SpecialPixel::His),
        _ => Some(SpecialPixel::Hrs),
    }
}

#[inline]
pub fn is_special(x: f64) -> bool {
    classify(x).is_some()
}

#[inline]
pub fn is_valid(x: f64) -> bool {
    classify(x).is_none()
}

#[inline]
pub fn is_null(x: f64) -> bool {
    classify(x) == Some(SpecialPixel::Null)
}

/// Apply a binary operation under the special-pixel contract: a special
/// operand yields NULL unless both operands are the same class, in which
/// case that class is kept. A non-finite result becomes NULL.
#[inline]
pub fn binary_op<F>(x: f64, y: f64, f: F) -> f64
where
    F: FnOnce(f64, f64) -> f64,
{
    match (classify(x), classify(y)) {
        (None, None) => {
            let r = f(x, y);
            if r.is_finite() && r >= VALID_MIN {
                r
            } else {
                NULL
            }
        }
        (Some(a), Some(b)) if a == b => a.value(),
        _ => NULL,
    }
}

/// Apply a unary operation; special inputs pass through unchanged.
#[inline]
pub fn unary_op<F>(x: f64, f: F) -> f64
where
    F: FnOnce(f64) -> f64,
{
    match classify(x) {
        Some(_) => x,
        None => {
            let r = f(x);
            if r.is_finite() {
                r
            } else {
                NULL
            }
        }
    }
}

pub fn add(x: f64, y: f64) -> f64 {
    binary_op(x, y, |a, b| a + b)
}

pub fn sub(x: f64, y: f64) -> f64 {
    binary_op(x, y, |a, b| a - b)
}

pub fn mul(x: f64, y: f64) -> f64 {
    binary_op(x, y, |a, b| a * b)
}

/// Division; a zero divisor yields NULL.
pub fn div(x: f64, y: f64) -> f64 {
    binary_op(x, y, |a, b| if b == 0.0 { f64::NAN } else { a / b })
}

// ============================================================================
// Import remap ranges
// ============================================================================

/// Inclusive raw-value ranges that are remapped to special classes on import.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpecialRanges {
    pub null: Option<(f64, f64)>,
    pub lrs: Option<(f64, f64)>,
    pub lis: Option<(f64, f64)>,
    pub his: Option<(f64, f64)>,
    pub hrs: Option<(f64, f64)>,
}

impl SpecialRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, class: SpecialPixel, min: f64, max: f64) -> Self {
        let slot = match class {
            SpecialPixel::Null => &mut self.null,
            SpecialPixel::Lrs => &mut self.lrs,
            SpecialPixel::Lis => &mut self.lis,
            SpecialPixel::His => &mut self.his,
            SpecialPixel::Hrs => &mut self.hrs,
        };
        *slot = Some((min, max));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> Vec<(SpecialPixel, (f64, f64))> {
        [
            (SpecialPixel::Null, self.null),
            (SpecialPixel::Lrs, self.lrs),
            (SpecialPixel::Lis, self.lis),
            (SpecialPixel::His, self.his),
            (SpecialPixel::Hrs, self.hrs),
        ]
        .into_iter()
        .filter_map(|(class, range)| range.map(|r| (class, r)))
        .collect()
    }

    /// Reject inverted or overlapping ranges.
    pub fn validate(&self) -> Result<()> {
        let entries = self.entries();
        for (class, (min, max)) in &entries {
            if min > max {
                return Err(CubeError::user(format!(
                    "{class} range minimum {min} exceeds maximum {max}"
                )));
            }
        }
        for (i, (a, (amin, amax))) in entries.iter().enumerate() {
            for (b, (bmin, bmax)) in entries.iter().skip(i + 1) {
                if amin <= bmax && bmin <= amax {
                    return Err(CubeError::user(format!(
                        "{a} range [{amin}, {amax}] overlaps {b} range [{bmin}, {bmax}]"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Special class of a raw value, tested in priority order
    /// NULL, HRS, LRS, HIS, LIS.
    pub fn test(&self, raw: f64) -> Option<SpecialPixel> {
        let inside = |r: Option<(f64, f64)>| r.map_or(false, |(lo, hi)| raw >= lo && raw <= hi);
        if inside(self.null) {
            Some(SpecialPixel::Null)
        } else if inside(self.hrs) {
            Some(SpecialPixel::Hrs)
        } else if inside(self.lrs) {
            Some(SpecialPixel::Lrs)
        } else if inside(self.his) {
            Some(SpecialPixel::His)
        } else if inside(self.lis) {
            Some(SpecialPixel::Lis)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_bit_patterns() {
        assert_eq!(NULL.to_bits(), 0xFFEF_FFFF_FFFF_FFFB);
        assert_eq!(LRS.to_bits(), 0xFFEF_FFFF_FFFF_FFFC);
        assert_eq!(LIS.to_bits(), 0xFFEF_FFFF_FFFF_FFFD);
        assert_eq!(HIS.to_bits(), 0xFFEF_FFFF_FFFF_FFFE);
        assert_eq!(HRS.to_bits(), 0xFFEF_FFFF_FFFF_FFFF);
        assert_eq!(VALID_MIN.to_bits(), 0xFFEF_FFFF_FFFF_FFFA);
    }

    #[test]
    fn test_classify_is_disjoint() {
        for class in SpecialPixel::ALL {
            assert_eq!(classify(class.value()), Some(class));
        }
        assert_eq!(classify(0.0), None);
        assert_eq!(classify(VALID_MIN), None);
        assert_eq!(classify(f64::NAN), Some(SpecialPixel::Null));
        assert_eq!(classify(f64::NEG_INFINITY), Some(SpecialPixel::Null));
    }

    #[test]
    fn test_binary_propagation() {
        assert_eq!(add(1.0, 2.0), 3.0);
        assert!(is_null(add(1.0, HIS)));
        assert!(is_null(add(LRS, HIS)));
        assert_eq!(classify(add(HIS, HIS)), Some(SpecialPixel::His));
        assert_eq!(classify(mul(LIS, LIS)), Some(SpecialPixel::Lis));
        assert!(is_null(div(4.0, 0.0)));
        assert_eq!(div(4.0, 2.0), 2.0);
    }

    #[test]
    fn test_unary_passes_specials() {
        assert_eq!(unary_op(HRS, |x| x * 2.0).to_bits(), HRS.to_bits());
        assert_eq!(unary_op(3.0, |x| x * 2.0), 6.0);
        assert!(is_null(unary_op(-1.0, f64::ln)));
    }

    #[test]
    fn test_ranges_priority_and_overlap() {
        let ranges = SpecialRanges::new()
            .with(SpecialPixel::Null, 0.0, 0.0)
            .with(SpecialPixel::Hrs, 4095.0, 4095.0)
            .with(SpecialPixel::Lis, 1.0, 2.0);
        assert!(ranges.validate().is_ok());
        assert_eq!(ranges.test(0.0), Some(SpecialPixel::Null));
        assert_eq!(ranges.test(2.0), Some(SpecialPixel::Lis));
        assert_eq!(ranges.test(4095.0), Some(SpecialPixel::Hrs));
        assert_eq!(ranges.test(100.0), None);

        let bad = ranges.with(SpecialPixel::His, 4000.0, 4095.0);
        let err = bad.validate().unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::User);
    }
}
