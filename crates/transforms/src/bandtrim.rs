//! Null whole spectra that have a NULL in any band.

use cube_common::special::{is_null, NULL};
use cube_common::{CubeError, Preferences, Result};
use cube_store::Buffer;
use pipeline::{BufferShape, LogProgress, ProcessSession, SessionReport, TileSink, TileSource};

/// Apply band-trim to every (sample, line) spectrum of `buffer` in place.
pub fn band_trim(buffer: &mut Buffer) {
    for l in 0..buffer.lines() {
        for s in 0..buffer.samples() {
            if (0..buffer.bands()).any(|b| is_null(buffer.get(s, l, b))) {
                for b in 0..buffer.bands() {
                    buffer.set(s, l, b, NULL);
                }
            }
        }
    }
}

/// Tile transform: one input brick spanning every band, one output.
pub fn band_trim_tile(inputs: &[Buffer], outputs: &mut [Buffer]) -> Result<()> {
    let (Some(input), Some(out)) = (inputs.first(), outputs.first_mut()) else {
        return Err(CubeError::bad_argument("band-trim expects one input and one output"));
    };
    out.copy_from(input)?;
    band_trim(out);
    Ok(())
}

/// Run band-trim over bricks of `tile_size` square spanning all bands.
pub fn run_band_trim<'a>(
    prefs: &Preferences,
    input: impl TileSource + 'a,
    output: impl TileSink + 'a,
) -> Result<SessionReport> {
    let bands = input.dimensions().bands;
    let size = prefs.tile_size.max(1);
    let mut session = ProcessSession::new("bandtrim", prefs);
    session.add_input(input);
    session.add_output(output);
    session
        .set_shape(BufferShape::brick(size, size, bands))
        .parallel()
        .set_progress(LogProgress::new());
    session.run(band_trim_tile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::special::HRS;
    use cube_store::Dimensions;

    #[test]
    fn test_only_null_triggers() {
        let mut b = Buffer::from_data(Dimensions::new(2, 1, 2), vec![1.0, HRS, 2.0, 3.0]).unwrap();
        band_trim(&mut b);
        assert_eq!(b.data(), &[1.0, HRS, 2.0, 3.0]);
    }
}
