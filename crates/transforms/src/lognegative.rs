//! Log-negative calibration for film-scanned images.
//!
//! `out = 65535 (1 - log2(65536 - in) / 16) - dark_current`, optionally
//! divided by a flat field.

use cube_common::special::{is_special, NULL};
use cube_common::{CubeError, Preferences, Result};
use cube_store::Buffer;
use pipeline::{LogProgress, ProcessSession, SessionReport, TileSink, TileSource};

const FULL_SCALE: f64 = 65535.0;
const RANGE: f64 = 65536.0;
const BITS: f64 = 16.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogNegative {
    pub dark_current: f64,
}

impl LogNegative {
    pub fn new(dark_current: f64) -> Self {
        Self { dark_current }
    }

    /// Calibrate one pixel. Specials pass through; inputs outside the
    /// domain of the logarithm become NULL.
    pub fn pixel(&self, x: f64) -> f64 {
        if is_special(x) {
            return x;
        }
        let headroom = RANGE - x;
        if headroom <= 0.0 {
            return NULL;
        }
        let out = FULL_SCALE * (1.0 - headroom.ln() / std::f64::consts::LN_2 / BITS) - self.dark_current;
        if out.is_finite() {
            out
        } else {
            NULL
        }
    }

    /// Calibrate and divide by a flat value.
    pub fn pixel_with_flat(&self, x: f64, flat: f64) -> f64 {
        let out = self.pixel(x);
        if is_special(out) {
            return out;
        }
        if is_special(flat) || flat == 0.0 {
            return NULL;
        }
        out / flat
    }

    /// Tile transform with inputs `[image]` or `[image, flat]`.
    pub fn tile(&self, inputs: &[Buffer], outputs: &mut [Buffer]) -> Result<()> {
        let image = inputs
            .first()
            .ok_or_else(|| CubeError::bad_argument("log-negative expects an input"))?;
        let out = outputs
            .first_mut()
            .ok_or_else(|| CubeError::bad_argument("log-negative expects an output"))?;
        match inputs.get(1) {
            Some(flat) => {
                for b in 0..image.bands() {
                    let fb = b.min(flat.bands() - 1);
                    for l in 0..image.lines() {
                        for s in 0..image.samples() {
                            out.set(s, l, b, self.pixel_with_flat(image.get(s, l, b), flat.get(s, l, fb)));
                        }
                    }
                }
            }
            None => {
                for (o, x) in out.data_mut().iter_mut().zip(image.data()) {
                    *o = self.pixel(*x);
                }
            }
        }
        Ok(())
    }

    pub fn run<'a>(
        &self,
        prefs: &Preferences,
        input: impl TileSource + 'a,
        flat: Option<Box<dyn TileSource + 'a>>,
        output: impl TileSink + 'a,
    ) -> Result<SessionReport> {
        let mut session = ProcessSession::new("lognegative", prefs);
        session.add_input(input);
        if let Some(flat) = flat {
            session.add_input(flat);
        }
        session.add_output(output);
        session.set_tiles().parallel().set_progress(LogProgress::new());
        session.run(|inputs, outputs| self.tile(inputs, outputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::special::LRS;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_end_points() {
        let cal = LogNegative::new(0.0);
        // 65536 - 0 = 2^16, so the bracket is zero.
        assert_approx_eq!(cal.pixel(0.0), 0.0, 1e-9);
        // 65536 - 65535 = 1, log is zero.
        assert_approx_eq!(cal.pixel(65535.0), 65535.0, 1e-9);
        // 2^8 left: half scale.
        assert_approx_eq!(cal.pixel(65280.0), 32767.5, 1e-9);
    }

    #[test]
    fn test_dark_and_flat() {
        let cal = LogNegative::new(7.5);
        assert_approx_eq!(cal.pixel_with_flat(65280.0, 2.0), (32767.5 - 7.5) / 2.0, 1e-9);
        assert_eq!(cal.pixel_with_flat(65280.0, 0.0), NULL);
        assert_eq!(cal.pixel_with_flat(LRS, 2.0), LRS);
    }

    #[test]
    fn test_out_of_domain_is_null() {
        let cal = LogNegative::new(0.0);
        assert_eq!(cal.pixel(65536.0), NULL);
        assert_eq!(cal.pixel(70000.0), NULL);
    }
}
