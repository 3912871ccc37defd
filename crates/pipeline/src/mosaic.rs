//! Mosaicking: place an input cube into a larger mosaic cube.
//!
//! The input's first sample, line and band land at a 1-based position of
//! the mosaic, which may lie partly outside it; the placed region is
//! clipped to the mosaic. Where the two overlap a [`MosaicPriority`]
//! decides which pixel survives.

use crate::io::{TileSink, TileSource};
use crate::plan::{Origin, OriginList};
use crate::session::{ProcessSession, SessionReport};
use crate::shape::BufferShape;
use cube_common::special::{classify, is_null, is_valid};
use cube_common::{CubeError, Preferences, Result, SpecialPixel};
use cube_store::{Buffer, Cube, Dimensions};
use label::{Container, Keyword, Traverse};
use tracing::{debug, info};

/// Band value placeholder for mosaic bands no input has filled yet.
pub const UNASSIGNED_BAND: &str = "NA";

/// Which value wins where the input meets existing mosaic data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MosaicPriority {
    /// The input is placed on top of the mosaic.
    Input,
    /// The input only fills NULL mosaic pixels.
    Mosaic,
    /// Whole spectra are compared on one input band.
    Band { band: usize, criteria: BandCriteria },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandCriteria {
    Lesser,
    Greater,
}

impl MosaicPriority {
    pub fn from_name(name: &str, band: Option<usize>, criteria: BandCriteria) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "INPUT" | "ONTOP" => Ok(Self::Input),
            "MOSAIC" | "BENEATH" => Ok(Self::Mosaic),
            "BAND" => {
                let band = band.ok_or_else(|| CubeError::user("band priority needs a comparison band"))?;
                Ok(Self::Band { band, criteria })
            }
            other => Err(CubeError::user(format!("unknown mosaic priority {other}"))),
        }
    }
}

impl BandCriteria {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "LESSER" | "LESS" => Ok(Self::Lesser),
            "GREATER" => Ok(Self::Greater),
            other => Err(CubeError::user(format!("unknown band criteria {other}"))),
        }
    }

    fn prefers(&self, input: f64, mosaic: f64) -> bool {
        match self {
            Self::Lesser => input < mosaic,
            Self::Greater => input > mosaic,
        }
    }
}

/// Placement and merge rules for one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicOptions {
    pub priority: MosaicPriority,
    /// Mosaic (sample, line, band) of the input's first pixel, 1-based.
    pub position: Origin,
    /// Let input HIS/HRS pixels replace mosaic data.
    pub high_saturation: bool,
    /// Let input LIS/LRS pixels replace mosaic data.
    pub low_saturation: bool,
    /// Let input NULL pixels replace mosaic data.
    pub null: bool,
}

impl Default for MosaicOptions {
    fn default() -> Self {
        Self {
            priority: MosaicPriority::Input,
            position: (1, 1, 1),
            high_saturation: false,
            low_saturation: false,
            null: false,
        }
    }
}

impl MosaicOptions {
    pub fn at(mut self, sample: i64, line: i64, band: i64) -> Self {
        self.position = (sample, line, band);
        self
    }

    pub fn with_priority(mut self, priority: MosaicPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_specials(mut self, high: bool, low: bool, null: bool) -> Self {
        self.high_saturation = high;
        self.low_saturation = low;
        self.null = null;
        self
    }

    /// Whether a special input pixel may overwrite mosaic data.
    fn passes_special(&self, value: f64) -> bool {
        match classify(value) {
            Some(SpecialPixel::Null) => self.null,
            Some(SpecialPixel::His | SpecialPixel::Hrs) => self.high_saturation,
            Some(SpecialPixel::Lis | SpecialPixel::Lrs) => self.low_saturation,
            None => false,
        }
    }
}

/// The part of the input that lands inside the mosaic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// First placed input (sample, line, band).
    pub input_start: Origin,
    /// Where that pixel lands in the mosaic.
    pub mosaic_start: Origin,
    pub dimensions: Dimensions,
}

impl Placement {
    /// Clip an input of `input` dimensions placed at `position` to a
    /// mosaic of `mosaic` dimensions.
    pub fn clip(input: Dimensions, mosaic: Dimensions, position: Origin) -> Result<Self> {
        let axis = |at: i64, inside: usize, outside: usize| -> Option<(i64, i64, usize)> {
            let skip = (1 - at).max(0);
            let first = at + skip;
            let last = (at + inside as i64 - 1).min(outside as i64);
            (last >= first).then(|| (1 + skip, first, (last - first + 1) as usize))
        };
        let (s, l, b) = position;
        match (
            axis(s, input.samples, mosaic.samples),
            axis(l, input.lines, mosaic.lines),
            axis(b, input.bands, mosaic.bands),
        ) {
            (Some((is, os, ns)), Some((il, ol, nl)), Some((ib, ob, nb))) => Ok(Self {
                input_start: (is, il, ib),
                mosaic_start: (os, ol, ob),
                dimensions: Dimensions::new(ns, nl, nb),
            }),
            _ => Err(CubeError::user(format!(
                "a {input} input placed at sample {s}, line {l}, band {b} does not overlap the {mosaic} mosaic"
            ))),
        }
    }

    fn offset(&self) -> Origin {
        (
            self.mosaic_start.0 - self.input_start.0,
            self.mosaic_start.1 - self.input_start.1,
            self.mosaic_start.2 - self.input_start.2,
        )
    }
}

/// Outcome of placing one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MosaicReport {
    pub placement: Placement,
    /// Mosaic pixels overwritten by the input.
    pub changed: u64,
    pub session: SessionReport,
}

/// Merge one input line (all placed bands) into the matching mosaic line.
/// `compare` is the buffer band used by band priority. Returns the number
/// of mosaic pixels replaced.
fn merge_line(input: &Buffer, mosaic: &mut Buffer, options: &MosaicOptions, compare: Option<usize>) -> u64 {
    let mut changed = 0;
    for s in 0..input.samples() {
        let spectrum = match (options.priority, compare) {
            (MosaicPriority::Band { criteria, .. }, Some(band)) => {
                let (i, m) = (input.get(s, 0, band), mosaic.get(s, 0, band));
                Some(if is_valid(i) {
                    !is_valid(m) || criteria.prefers(i, m)
                } else {
                    options.passes_special(i)
                })
            }
            _ => None,
        };
        for b in 0..input.bands() {
            let (i, m) = (input.get(s, 0, b), mosaic.get(s, 0, b));
            let take = match (options.priority, spectrum) {
                (_, Some(take)) => take,
                (MosaicPriority::Mosaic, _) => is_null(m),
                _ => is_null(m) || is_valid(i) || options.passes_special(i),
            };
            if take {
                mosaic.set(s, 0, b, i);
                changed += 1;
            }
        }
    }
    changed
}

/// Place `input` into `mosaic`. Lines of the placed region are read from
/// both cubes, merged and written back to the mosaic.
pub fn mosaic<I, M>(prefs: &Preferences, input: &mut I, mosaic: &mut M, options: &MosaicOptions) -> Result<MosaicReport>
where
    I: TileSource + ?Sized,
    M: TileSource + TileSink + ?Sized,
{
    let placement = Placement::clip(
        TileSource::dimensions(&*input),
        TileSource::dimensions(&*mosaic),
        options.position,
    )?;
    let compare = match options.priority {
        MosaicPriority::Band { band, .. } => {
            let first = placement.input_start.2 as usize;
            if band < first || band >= first + placement.dimensions.bands {
                return Err(CubeError::bad_argument(format!(
                    "comparison band {} is not among the placed input bands {}-{}",
                    band,
                    first,
                    first + placement.dimensions.bands - 1
                )));
            }
            Some(band - first)
        }
        _ => None,
    };

    let dims = placement.dimensions;
    let shape = BufferShape::new(dims.samples, 1, dims.bands);
    let (is, il, ib) = placement.input_start;
    let origins = (0..dims.lines as i64).map(|l| (is, il + l, ib)).collect();
    let (ds, dl, db) = placement.offset();
    debug!(?placement, priority = ?options.priority, "Placing mosaic input");

    let mut session = ProcessSession::new("mosaic", prefs);
    session.add_input(&mut *input);
    session.set_plan(OriginList::new(shape, origins));

    let mut target = Buffer::new(shape.dimensions());
    let mut changed = 0;
    let report = session.run_mut(|inputs, _| {
        let source = &inputs[0];
        let (s, l, b) = source.origin();
        target.set_origin(s + ds, l + dl, b + db);
        mosaic.read_tile(&mut target)?;
        changed += merge_line(source, &mut target, options, compare);
        mosaic.write_tile(&target)
    })?;
    mosaic.finish()?;

    info!(
        samples = dims.samples,
        lines = dims.lines,
        bands = dims.bands,
        changed,
        "Placed input into mosaic"
    );
    Ok(MosaicReport {
        placement,
        changed,
        session: report,
    })
}

/// Reconcile the mosaic's `BandBin` with the input's for the placed bands.
/// Bands the mosaic still marks as unassigned take the input's values;
/// any other difference is an error.
pub fn match_band_bin(input: &Container, mosaic: &mut Container, placement: &Placement) -> Result<()> {
    let names = |group: &Container| group.keywords().map(|k| k.name.to_ascii_lowercase()).collect::<Vec<_>>();
    let (mut wanted, mut have) = (names(input), names(mosaic));
    wanted.sort();
    have.sort();
    if wanted != have {
        return Err(CubeError::user(format!(
            "BandBin keywords differ: input has {wanted:?}, mosaic has {have:?}"
        )));
    }
    let input_first = placement.input_start.2 as usize - 1;
    let mosaic_first = placement.mosaic_start.2 as usize - 1;
    for keyword in input.keywords() {
        let target = mosaic.keyword_mut(&keyword.name, Traverse::CurrentLevel)?;
        for k in 0..placement.dimensions.bands {
            let (i, m) = (input_first + k, mosaic_first + k);
            if i >= keyword.len() || m >= target.len() {
                break;
            }
            let value = keyword.value(i)?;
            let existing = target.value(m)?;
            if existing.eq_ignore_ascii_case(UNASSIGNED_BAND) {
                target.set_value(m, value, keyword.unit(i)?)?;
            } else if existing != value {
                return Err(CubeError::user(format!(
                    "BandBin {} of mosaic band {} is {} but the input has {}",
                    keyword.name,
                    m + 1,
                    existing,
                    value
                )));
            }
        }
    }
    Ok(())
}

/// A `BandBin` for a new mosaic of `bands` bands holding the input's
/// values at the placed bands and [`UNASSIGNED_BAND`] elsewhere.
pub fn mosaic_band_bin(input: &Container, bands: usize, placement: &Placement) -> Container {
    let mut group = Container::new("BandBin");
    let input_first = placement.input_start.2 as usize - 1;
    let mosaic_first = placement.mosaic_start.2 as usize - 1;
    for keyword in input.keywords() {
        let mut out = Keyword::empty(&keyword.name);
        let placed = mosaic_first..mosaic_first + placement.dimensions.bands;
        for m in 0..bands {
            let i = input_first + m.saturating_sub(mosaic_first);
            match keyword.values.get(i).filter(|_| placed.contains(&m)) {
                Some(value) => out.add_value(value.clone()),
                None => out.add_value(UNASSIGNED_BAND),
            }
        }
        group.add_keyword(out);
    }
    group
}

/// Place an input cube into a mosaic cube, reconciling `BandBin` groups
/// when `match_bands` is set. A mosaic without a `BandBin` takes one
/// built from the input.
pub fn mosaic_cubes(
    prefs: &Preferences,
    input: &mut Cube,
    target: &mut Cube,
    options: &MosaicOptions,
    match_bands: bool,
) -> Result<MosaicReport> {
    let placement = Placement::clip(Cube::dimensions(input), Cube::dimensions(target), options.position)?;
    if match_bands {
        let bin = input
            .group("BandBin")
            .map_err(|_| CubeError::user(format!("{} has no BandBin group to match", input.path().display())))?
            .clone();
        if target.has_group("BandBin") {
            let mut existing = target.group("BandBin")?.clone();
            match_band_bin(&bin, &mut existing, &placement)?;
            target.put_group(existing)?;
        } else {
            target.put_group(mosaic_band_bin(&bin, Cube::dimensions(target).bands, &placement))?;
        }
    }
    mosaic(prefs, input, target, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cube_common::special::{HIS, NULL};
    use label::Value;

    #[test]
    fn test_clip_against_every_edge() {
        let mosaic = Dimensions::new(10, 8, 3);
        let p = Placement::clip(Dimensions::new(4, 4, 2), mosaic, (-1, 7, 2)).unwrap();
        assert_eq!(p.input_start, (3, 1, 1));
        assert_eq!(p.mosaic_start, (1, 7, 2));
        assert_eq!(p.dimensions, Dimensions::new(2, 2, 2));

        let p = Placement::clip(Dimensions::new(4, 4, 5), mosaic, (9, 1, 0)).unwrap();
        assert_eq!(p.input_start, (1, 1, 2));
        assert_eq!(p.dimensions, Dimensions::new(2, 4, 3));

        let err = Placement::clip(Dimensions::new(4, 4, 1), mosaic, (11, 1, 1)).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::User);
        assert!(Placement::clip(Dimensions::new(4, 4, 1), mosaic, (1, -3, 1)).is_err());
    }

    fn line(values: &[f64]) -> Buffer {
        Buffer::from_data(Dimensions::new(values.len(), 1, 1), values.to_vec()).unwrap()
    }

    #[test]
    fn test_merge_rules() {
        let input = line(&[1.0, NULL, HIS, 4.0]);
        let mosaic = line(&[9.0, 9.0, 9.0, NULL]);

        let mut out = mosaic.clone();
        let on_top = MosaicOptions::default();
        assert_eq!(merge_line(&input, &mut out, &on_top, None), 2);
        assert_eq!(out.data(), &[1.0, 9.0, 9.0, 4.0]);

        let mut out = mosaic.clone();
        let high = MosaicOptions::default().with_specials(true, false, false);
        merge_line(&input, &mut out, &high, None);
        assert_eq!(out.data(), &[1.0, 9.0, HIS, 4.0]);

        let mut out = mosaic.clone();
        let beneath = MosaicOptions::default().with_priority(MosaicPriority::Mosaic);
        assert_eq!(merge_line(&input, &mut out, &beneath, None), 1);
        assert_eq!(out.data(), &[9.0, 9.0, 9.0, 4.0]);
    }

    #[test]
    fn test_band_bin_reconciliation() {
        let mut input = Container::new("BandBin");
        input.add_keyword(Keyword::array("Center", [Value::new("0.5"), Value::new("0.6")]));
        let input_only = Placement {
            input_start: (1, 1, 1),
            mosaic_start: (1, 1, 2),
            dimensions: Dimensions::new(1, 1, 2),
        };

        let created = mosaic_band_bin(&input, 4, &input_only);
        let center = created.keyword("Center", Traverse::CurrentLevel).unwrap();
        let values: Vec<&str> = (0..4).map(|i| center.value(i).unwrap()).collect();
        assert_eq!(values, ["NA", "0.5", "0.6", "NA"]);

        let mut existing = created.clone();
        let shifted = Placement {
            mosaic_start: (1, 1, 3),
            ..input_only
        };
        let err = match_band_bin(&input, &mut existing, &shifted).unwrap_err();
        assert_eq!(err.kind(), cube_common::ErrorKind::User);

        let mut existing = created;
        let tail = Placement {
            input_start: (1, 1, 2),
            mosaic_start: (1, 1, 4),
            dimensions: Dimensions::new(1, 1, 1),
        };
        match_band_bin(&input, &mut existing, &tail).unwrap();
        assert_eq!(existing.keyword("Center", Traverse::CurrentLevel).unwrap().value(3).unwrap(), "0.6");
    }
}
