//! Dark subtraction and flat-field division.

use cube_common::special::{self, is_special};
use cube_common::{CubeError, Preferences, Result};
use cube_store::Buffer;
use label::{Container, Keyword};
use pipeline::{LogProgress, ProcessSession, SessionReport, TileSink, TileSource};

/// `x - dark` under the special-pixel rules.
pub fn dark_subtract(x: f64, dark: f64) -> f64 {
    special::sub(x, dark)
}

/// `(x - dark) / flat`, or NULL when any operand is special or the flat is
/// zero.
pub fn flat_field_pixel(x: f64, flat: f64, dark: f64) -> f64 {
    if is_special(x) || is_special(flat) || is_special(dark) || flat == 0.0 {
        return special::NULL;
    }
    let out = (x - dark) / flat;
    if out.is_finite() {
        out
    } else {
        special::NULL
    }
}

/// Tile transform with inputs `[image, flat, dark]` and one output.
///
/// Flat and dark buffers may hold a single band, in which case it applies
/// to every band of the image.
pub fn flat_field_tile(inputs: &[Buffer], outputs: &mut [Buffer]) -> Result<()> {
    let [image, flat, dark] = inputs else {
        return Err(CubeError::bad_argument(format!(
            "flat-field expects 3 inputs, got {}",
            inputs.len()
        )));
    };
    let out = outputs
        .first_mut()
        .ok_or_else(|| CubeError::bad_argument("flat-field expects an output"))?;
    for b in 0..image.bands() {
        let fb = b.min(flat.bands() - 1);
        let db = b.min(dark.bands() - 1);
        for l in 0..image.lines() {
            for s in 0..image.samples() {
                let value = flat_field_pixel(image.get(s, l, b), flat.get(s, l, fb), dark.get(s, l, db));
                out.set(s, l, b, value);
            }
        }
    }
    Ok(())
}

/// Run flat-field calibration tile by tile on the rayon pool.
pub fn flat_field<'a>(
    prefs: &Preferences,
    image: impl TileSource + 'a,
    flat: impl TileSource + 'a,
    dark: impl TileSource + 'a,
    output: impl TileSink + 'a,
) -> Result<SessionReport> {
    let mut session = ProcessSession::new("flatfield", prefs);
    session.add_input(image);
    session.add_input(flat);
    session.add_input(dark);
    session.add_output(output);
    session.set_tiles().parallel().set_progress(LogProgress::new());
    session.run(flat_field_tile)
}

/// The `Radiometry` group a calibrator adds to its output cube.
pub fn radiometry_group(flat_file: &str, dark_file: &str) -> Container {
    let mut group = Container::new("Radiometry");
    group.add_keyword(Keyword::new("FlatFile", flat_file));
    group.add_keyword(Keyword::new("DarkFile", dark_file));
    group.add_keyword(Keyword::new("Equation", "(DN - Dark) / Flat"));
    group
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::special::{HRS, LIS, NULL};

    #[test]
    fn test_pixel_rules() {
        assert_eq!(flat_field_pixel(100.0, 2.0, 10.0), 45.0);
        assert_eq!(flat_field_pixel(100.0, 0.0, 10.0), NULL);
        assert_eq!(flat_field_pixel(HRS, 2.0, 10.0), NULL);
        assert_eq!(flat_field_pixel(100.0, 2.0, LIS), NULL);
    }

    #[test]
    fn test_dark_subtract_keeps_matching_specials() {
        assert_eq!(dark_subtract(100.0, 10.0), 90.0);
        assert_eq!(dark_subtract(HRS, HRS), HRS);
        assert_eq!(dark_subtract(HRS, 10.0), NULL);
    }

    #[test]
    fn test_tile_needs_three_inputs() {
        let b = Buffer::new(cube_store::Dimensions::new(2, 1, 1));
        let mut out = vec![b.clone()];
        let err = flat_field_tile(&[b.clone(), b], &mut out).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::BadArgument);
    }
}
