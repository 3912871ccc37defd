//! Reseau mark removal.
//!
//! Reseau positions live in the `Reseaus` label group as parallel `Line`,
//! `Sample`, `Type` and `Valid` arrays, or in a table of the same fields.
//! Each valid reseau is patched inside a square brick centered on it: the
//! central cross of width `W` is replaced by NULL or by an interpolation
//! between the pixels just outside the cross.

use cube_common::special::{is_special, NULL};
use cube_common::{CubeError, Result};
use cube_store::{Buffer, Dimensions, FieldDef, FieldType, FieldValue, Table};
use label::{Container, Keyword, Traverse};
use pipeline::{TileSink, TileSource};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reseau {
    pub sample: f64,
    pub line: f64,
    pub kind: i32,
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReseauPolicy {
    Null,
    Interpolate,
}

impl ReseauPolicy {
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NULL" => Ok(Self::Null),
            "INTERPOLATE" | "BILINEAR" => Ok(Self::Interpolate),
            other => Err(CubeError::user(format!("unknown reseau policy {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReseauTable {
    pub reseaus: Vec<Reseau>,
}

impl ReseauTable {
    pub fn new(reseaus: Vec<Reseau>) -> Self {
        Self { reseaus }
    }

    pub fn valid(&self) -> impl Iterator<Item = &Reseau> {
        self.reseaus.iter().filter(|r| r.valid)
    }

    /// Read a `Reseaus` label group.
    pub fn from_group(group: &Container) -> Result<Self> {
        let lines = group.keyword("Line", Traverse::CurrentLevel)?;
        let samples = group.keyword("Sample", Traverse::CurrentLevel)?;
        let types = group.keyword("Type", Traverse::CurrentLevel)?;
        let valid = group.keyword("Valid", Traverse::CurrentLevel)?;
        let n = lines.len();
        if samples.len() != n || types.len() != n || valid.len() != n {
            return Err(CubeError::user(format!(
                "Reseaus group arrays differ in length: Line {}, Sample {}, Type {}, Valid {}",
                n,
                samples.len(),
                types.len(),
                valid.len()
            )));
        }
        let reseaus = (0..n)
            .map(|i| {
                Ok(Reseau {
                    sample: samples.as_f64(i)?,
                    line: lines.as_f64(i)?,
                    kind: types.as_i64(i)? as i32,
                    valid: valid.as_i64(i)? != 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { reseaus })
    }

    pub fn to_group(&self) -> Container {
        let mut group = Container::new("Reseaus");
        group.add_keyword(Keyword::array("Line", self.reseaus.iter().map(|r| r.line.to_string())));
        group.add_keyword(Keyword::array("Sample", self.reseaus.iter().map(|r| r.sample.to_string())));
        group.add_keyword(Keyword::array("Type", self.reseaus.iter().map(|r| r.kind.to_string())));
        group.add_keyword(Keyword::array(
            "Valid",
            self.reseaus.iter().map(|r| if r.valid { "1" } else { "0" }),
        ));
        group
    }

    pub fn from_table(table: &Table) -> Result<Self> {
        let s = table.field_index("Sample")?;
        let l = table.field_index("Line")?;
        let t = table.field_index("Type")?;
        let v = table.field_index("Valid")?;
        let number = |record: &[FieldValue], i: usize| {
            record[i]
                .as_f64()
                .ok_or_else(|| CubeError::user(format!("table {} field {} is not numeric", table.name, i + 1)))
        };
        let reseaus = table
            .records()
            .iter()
            .map(|record| {
                Ok(Reseau {
                    sample: number(record, s)?,
                    line: number(record, l)?,
                    kind: number(record, t)? as i32,
                    valid: number(record, v)? != 0.0,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { reseaus })
    }

    pub fn to_table(&self) -> Result<Table> {
        let mut table = Table::new(
            "Reseaus",
            vec![
                FieldDef::new("Sample", FieldType::Double, 1),
                FieldDef::new("Line", FieldType::Double, 1),
                FieldDef::new("Type", FieldType::Integer, 1),
                FieldDef::new("Valid", FieldType::Integer, 1),
            ],
        );
        for r in &self.reseaus {
            table.add_record(vec![
                FieldValue::Double(vec![r.sample]),
                FieldValue::Double(vec![r.line]),
                FieldValue::Integer(vec![r.kind]),
                FieldValue::Integer(vec![r.valid as i32]),
            ])?;
        }
        Ok(table)
    }
}

/// Brick size, cross width and fill policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReseauPatch {
    pub size: usize,
    pub width: usize,
    pub policy: ReseauPolicy,
}

impl ReseauPatch {
    pub fn new(size: usize, width: usize, policy: ReseauPolicy) -> Self {
        Self { size, width, policy }
    }

    pub fn validate(&self) -> Result<()> {
        if self.size % 2 == 0 || self.width % 2 == 0 {
            return Err(CubeError::bad_argument(format!(
                "reseau brick {} and cross width {} must be odd",
                self.size, self.width
            )));
        }
        if self.width + 2 > self.size {
            return Err(CubeError::bad_argument(format!(
                "reseau brick {} leaves no pixels outside a cross of width {}",
                self.size, self.width
            )));
        }
        Ok(())
    }
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    if is_special(a) || is_special(b) {
        NULL
    } else {
        a + (b - a) * t
    }
}

/// Patch the central cross of every band of `brick`.
///
/// Bar pixels read only pixels outside the cross and the crossing reads
/// only bar pixels, so the brick is patched in place without a copy.
pub fn patch_brick(brick: &mut Buffer, width: usize, policy: ReseauPolicy) -> Result<()> {
    let (ns, nl) = (brick.samples(), brick.lines());
    if width % 2 == 0 {
        return Err(CubeError::bad_argument(format!("reseau cross width {width} must be odd")));
    }
    let half = width / 2;
    let (cs, cl) = ((ns.saturating_sub(1)) / 2, (nl.saturating_sub(1)) / 2);
    // First and last index of each bar; one pixel on either side must
    // remain inside the brick.
    let bar = |center: usize, extent: usize| {
        let first = center.checked_sub(half).filter(|first| *first >= 1)?;
        let last = center + half;
        (last + 1 < extent).then_some((first, last))
    };
    let (Some((s0, s1)), Some((l0, l1))) = (bar(cs, ns), bar(cl, nl)) else {
        return Err(CubeError::bad_argument(format!(
            "{ns}x{nl} brick is too small for a cross of width {width}"
        )));
    };
    let in_column = |s: usize| (s0..=s1).contains(&s);
    let in_row = |l: usize| (l0..=l1).contains(&l);
    let across = |at: usize, first: usize, last: usize| (at + 1 - first) as f64 / (last + 2 - first) as f64;

    for b in 0..brick.bands() {
        for l in 0..nl {
            for s in 0..ns {
                let (col, row) = (in_column(s), in_row(l));
                if !col && !row {
                    continue;
                }
                let value = match (policy, row, col) {
                    (ReseauPolicy::Null, _, _) => NULL,
                    (ReseauPolicy::Interpolate, true, false) => {
                        lerp(brick.get(s, l0 - 1, b), brick.get(s, l1 + 1, b), across(l, l0, l1))
                    }
                    (ReseauPolicy::Interpolate, false, true) => {
                        lerp(brick.get(s0 - 1, l, b), brick.get(s1 + 1, l, b), across(s, s0, s1))
                    }
                    // The crossing is filled from both bars below.
                    (ReseauPolicy::Interpolate, _, _) => continue,
                };
                brick.set(s, l, b, value);
            }
        }
        if policy == ReseauPolicy::Interpolate {
            for l in l0..=l1 {
                for s in s0..=s1 {
                    let vertical = lerp(brick.get(s, l0 - 1, b), brick.get(s, l1 + 1, b), across(l, l0, l1));
                    let horizontal = lerp(brick.get(s0 - 1, l, b), brick.get(s1 + 1, l, b), across(s, s0, s1));
                    let value = match (is_special(vertical), is_special(horizontal)) {
                        (false, false) => (vertical + horizontal) / 2.0,
                        (false, true) => vertical,
                        (true, false) => horizontal,
                        (true, true) => NULL,
                    };
                    brick.set(s, l, b, value);
                }
            }
        }
    }
    Ok(())
}

/// Patch every valid reseau of `table` in place. Returns the number of
/// reseaus patched.
pub fn patch_reseaus<C>(cube: &mut C, table: &ReseauTable, patch: ReseauPatch) -> Result<usize>
where
    C: TileSource + TileSink + ?Sized,
{
    patch.validate()?;
    let dims = TileSource::dimensions(&*cube);
    let half = (patch.size / 2) as i64;
    let mut brick = Buffer::new(Dimensions::new(patch.size, patch.size, 1));
    let mut patched = 0;
    for reseau in table.valid() {
        let (s, l) = (reseau.sample.round() as i64, reseau.line.round() as i64);
        if s < 1 || l < 1 || s > dims.samples as i64 || l > dims.lines as i64 {
            debug!(sample = reseau.sample, line = reseau.line, "Reseau outside the image");
            continue;
        }
        for band in 1..=dims.bands as i64 {
            brick.set_origin(s - half, l - half, band);
            cube.read_tile(&mut brick)?;
            patch_brick(&mut brick, patch.width, patch.policy)?;
            cube.write_tile(&brick)?;
        }
        patched += 1;
    }
    info!(
        patched,
        total = table.reseaus.len(),
        policy = ?patch.policy,
        "Patched reseaus"
    );
    Ok(patched)
}
