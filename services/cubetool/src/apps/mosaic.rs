//! Placement of one cube into an existing mosaic cube.

use crate::{write_out, App, AppContext};
use cube_common::{AppDefinition, CubeError, ParameterDef, ParameterKind, Parameters, Result};
use cube_store::{AccessMode, Cube};
use pipeline::{mosaic_cubes, BandCriteria, MosaicOptions, MosaicPriority};

fn choice(values: &[&str]) -> ParameterKind {
    ParameterKind::Choice(values.iter().map(|v| v.to_string()).collect())
}

pub(crate) fn app() -> App {
    let position = |name: &str, what: &str| ParameterDef::new(name, ParameterKind::Integer, what).default_value("1");
    let flag = |name: &str, what: &str| ParameterDef::new(name, ParameterKind::Boolean, what).default_value("no");
    App::new(
        AppDefinition::new("mosaic", "Place a cube into an existing mosaic cube")
            .param(ParameterDef::new("FROM", ParameterKind::Filename, "Input cube").required())
            .param(ParameterDef::new("MOSAIC", ParameterKind::Filename, "Mosaic cube, updated in place").required())
            .param(position("OUTSAMPLE", "Mosaic sample of the input's first sample"))
            .param(position("OUTLINE", "Mosaic line of the input's first line"))
            .param(position("OUTBAND", "Mosaic band of the input's first band"))
            .param(ParameterDef::new("PRIORITY", choice(&["Input", "Mosaic", "Band"]), "Which pixel wins").default_value("Input"))
            .param(ParameterDef::new("COMPARISON_BAND", ParameterKind::Integer, "Input band compared under band priority"))
            .param(ParameterDef::new("CRITERIA", choice(&["Lesser", "Greater"]), "Band priority comparison").default_value("Lesser"))
            .param(flag("HIGHSATURATION", "Input high saturation replaces mosaic data"))
            .param(flag("LOWSATURATION", "Input low saturation replaces mosaic data"))
            .param(flag("NULL", "Input NULL replaces mosaic data"))
            .param(flag("MATCHBANDBIN", "Require matching BandBin groups")),
        run,
    )
}

fn run(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let band = if params.has("COMPARISON_BAND") {
        Some(usize::try_from(params.integer("COMPARISON_BAND")?).map_err(|_| {
            CubeError::user("COMPARISON_BAND must be positive")
        })?)
    } else {
        None
    };
    let criteria = BandCriteria::from_name(&params.string("CRITERIA")?)?;
    let options = MosaicOptions::default()
        .with_priority(MosaicPriority::from_name(&params.string("PRIORITY")?, band, criteria)?)
        .at(params.integer("OUTSAMPLE")?, params.integer("OUTLINE")?, params.integer("OUTBAND")?)
        .with_specials(
            params.boolean("HIGHSATURATION")?,
            params.boolean("LOWSATURATION")?,
            params.boolean("NULL")?,
        );

    let mut input = ctx.open_cube(&params.filename("FROM")?)?;
    let mut target = Cube::open_with(&params.filename("MOSAIC")?, AccessMode::ReadWrite, ctx.prefs)?;
    let report = mosaic_cubes(ctx.prefs, &mut input, &mut target, &options, params.boolean("MATCHBANDBIN")?)?;
    target.close()?;

    let (s, l, b) = report.placement.mosaic_start;
    write_out(
        ctx.out,
        &format!(
            "StartSample = {s}\nStartLine = {l}\nStartBand = {b}\nDimensions = {}\nChanged = {}\n",
            report.placement.dimensions, report.changed
        ),
    )
}
