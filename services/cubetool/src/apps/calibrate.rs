//! Per-pixel cube operations: flatfield, lognegative and bandtrim.

use crate::{write_out, App, AppContext};
use cube_common::{AppDefinition, ParameterDef, ParameterKind, Parameters, Result};
use pipeline::{create_output, SessionReport, TileSource};
use transforms::{flat_field, radiometry_group, run_band_trim, LogNegative};

fn from_to(name: &str, description: &str) -> AppDefinition {
    AppDefinition::new(name, description)
        .param(ParameterDef::new("FROM", ParameterKind::Filename, "Input cube").required())
        .param(ParameterDef::new("TO", ParameterKind::Filename, "Output cube").required())
}

pub(crate) fn apps() -> Vec<App> {
    vec![
        App::new(
            from_to("flatfield", "Subtract a dark cube and divide by a flat-field cube")
                .param(ParameterDef::new("FLAT", ParameterKind::Filename, "Flat-field cube").required())
                .param(ParameterDef::new("DARK", ParameterKind::Filename, "Dark cube").required()),
            flatfield,
        ),
        App::new(
            from_to("lognegative", "Log-negative calibration of film-scanned DNs")
                .param(ParameterDef::new("FLAT", ParameterKind::Filename, "Optional flat-field cube"))
                .param(
                    ParameterDef::new("DARKCURRENT", ParameterKind::Double, "Dark current subtracted after the log")
                        .default_value("0.0"),
                ),
            lognegative,
        ),
        App::new(
            from_to("bandtrim", "Set a whole spectrum to NULL when any band is NULL"),
            bandtrim,
        ),
    ]
}

fn summary(ctx: &mut AppContext<'_>, report: &SessionReport) -> Result<()> {
    write_out(ctx.out, &format!("Tiles = {}\n", report.tiles))
}

fn flatfield(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let flat_path = ctx.prefs.data_file(&params.filename("FLAT")?);
    let dark_path = ctx.prefs.data_file(&params.filename("DARK")?);
    let mut input = ctx.open_cube(&params.filename("FROM")?)?;
    let flat = ctx.open_cube(&flat_path)?;
    let dark = ctx.open_cube(&dark_path)?;
    let mut output = create_output(params.filename("TO")?, &input, &ctx.output_options())?;
    output.put_group(radiometry_group(
        &flat_path.display().to_string(),
        &dark_path.display().to_string(),
    ))?;

    let report = flat_field(ctx.prefs, &mut input, flat, dark, &mut output)?;
    output.close()?;
    summary(ctx, &report)
}

fn lognegative(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let calibration = LogNegative::new(params.double("DARKCURRENT")?);
    let mut input = ctx.open_cube(&params.filename("FROM")?)?;
    let flat: Option<Box<dyn TileSource>> = if params.has("FLAT") {
        Some(Box::new(ctx.open_data_cube(&params.filename("FLAT")?)?))
    } else {
        None
    };
    let mut output = create_output(params.filename("TO")?, &input, &ctx.output_options())?;
    let report = calibration.run(ctx.prefs, &mut input, flat, &mut output)?;
    output.close()?;
    summary(ctx, &report)
}

fn bandtrim(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let mut input = ctx.open_cube(&params.filename("FROM")?)?;
    let mut output = create_output(params.filename("TO")?, &input, &ctx.output_options())?;
    let report = run_band_trim(ctx.prefs, &mut input, &mut output)?;
    output.close()?;
    summary(ctx, &report)
}
