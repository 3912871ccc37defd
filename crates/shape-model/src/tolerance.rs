//! Fuzzy comparisons for geometric predicates.

/// Absolute plus relative tolerance.
///
/// A quantity `x` whose natural magnitude is `scale` is treated as zero when
/// `|x| <= absolute + relative * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub absolute: f64,
    pub relative: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            absolute: 1e-12,
            relative: 1e-12,
        }
    }
}

impl Tolerance {
    pub fn new(absolute: f64, relative: f64) -> Self {
        Self { absolute, relative }
    }

    #[inline]
    pub fn is_zero(&self, x: f64, scale: f64) -> bool {
        x.abs() <= self.absolute + self.relative * scale.abs()
    }

    #[inline]
    pub fn eq(&self, a: f64, b: f64) -> bool {
        self.is_zero(a - b, a.abs().max(b.abs()))
    }

    /// Sign of `x` with values inside the tolerance band mapped to zero.
    #[inline]
    pub fn sign(&self, x: f64, scale: f64) -> i8 {
        if self.is_zero(x, scale) {
            0
        } else if x > 0.0 {
            1
        } else {
            -1
        }
    }
}
