//! grid: latitude/longitude gridlines of a map projection as GML.

use crate::{write_out, App, AppContext};
use cube_common::{AppDefinition, CubeError, ParameterDef, ParameterKind, Parameters, Result};
use label::{pvl, Container, Traverse};
use projection::{from_mapping_group, GroundRange};
use std::path::Path;
use tracing::info;
use transforms::{grid::to_gml, GridOptions, GridWalker};

pub(crate) fn app() -> App {
    let definition = AppDefinition::new("grid", "Write projected latitude/longitude gridlines as GML")
        .param(
            ParameterDef::new("MAP", ParameterKind::Filename, "Projected cube or PVL file with a Mapping group")
                .required(),
        )
        .param(ParameterDef::new("TO", ParameterKind::Filename, "Output GML file").required())
        .param(ParameterDef::new("LATINC", ParameterKind::Double, "Latitude spacing in degrees").default_value("10.0"))
        .param(ParameterDef::new("LONINC", ParameterKind::Double, "Longitude spacing in degrees").default_value("10.0"))
        .param(ParameterDef::new("STEP", ParameterKind::Double, "Sampling step along a line in degrees").default_value("1.0"))
        .param(ParameterDef::new(
            "JUMP",
            ParameterKind::Double,
            "Projected distance that starts a new sub-line",
        ))
        .param(ParameterDef::new("MINLAT", ParameterKind::Double, "Minimum latitude"))
        .param(ParameterDef::new("MAXLAT", ParameterKind::Double, "Maximum latitude"))
        .param(ParameterDef::new("MINLON", ParameterKind::Double, "Minimum longitude"))
        .param(ParameterDef::new("MAXLON", ParameterKind::Double, "Maximum longitude"));
    App::new(definition, grid)
}

/// The `Mapping` group of a cube, or of a PVL file when `path` is not a
/// cube.
fn mapping_group(ctx: &AppContext<'_>, path: &Path) -> Result<Container> {
    if let Ok(cube) = ctx.open_cube(path) {
        return cube.group("Mapping").cloned();
    }
    let text = std::fs::read_to_string(path).map_err(|e| CubeError::io(path, e))?;
    let label = pvl::parse(&text)?;
    label.group("Mapping", Traverse::DepthFirst).cloned()
}

fn explicit_range(params: &Parameters) -> Result<Option<GroundRange>> {
    let keys = ["MINLAT", "MAXLAT", "MINLON", "MAXLON"];
    let given = keys.iter().filter(|k| params.has(k)).count();
    match given {
        0 => Ok(None),
        4 => Ok(Some(GroundRange {
            min_lat: params.double("MINLAT")?,
            max_lat: params.double("MAXLAT")?,
            min_lon: params.double("MINLON")?,
            max_lon: params.double("MAXLON")?,
        })),
        _ => Err(CubeError::user(
            "MINLAT, MAXLAT, MINLON and MAXLON must be given together",
        )),
    }
}

fn grid(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let map = params.filename("MAP")?;
    let projection = from_mapping_group(&mapping_group(ctx, &map)?)?;

    let mut options = GridOptions::default()
        .with_spacing(params.double("LATINC")?, params.double("LONINC")?)
        .with_step(params.double("STEP")?);
    if params.has("JUMP") {
        options = options.with_jump_distance(params.double("JUMP")?);
    }
    if let Some(range) = explicit_range(params)? {
        options = options.with_range(range);
    }

    let lines = GridWalker::new(projection.as_ref(), options)?.walk()?;
    let gml = to_gml(&lines)?;
    let to = params.filename("TO")?;
    std::fs::write(&to, gml).map_err(|e| CubeError::io(&to, e))?;
    info!(projection = projection.name(), lines = lines.len(), to = %to.display(), "Wrote grid");

    let segments: usize = lines.iter().map(|l| l.segments.len()).sum();
    write_out(ctx.out, &format!("Lines = {}\nSegments = {}\n", lines.len(), segments))
}
