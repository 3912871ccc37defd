//! dskinfo: describe a plate-model shape kernel.

use crate::{write_out, App, AppContext};
use cube_common::{AppDefinition, ParameterDef, ParameterKind, Parameters, Result};
use shape_model::DskShapeModel;

pub(crate) fn app() -> App {
    let definition = AppDefinition::new("dskinfo", "Print the segment summary of a shape kernel")
        .param(ParameterDef::new("FROM", ParameterKind::Filename, "Shape kernel").required());
    App::new(definition, dskinfo)
}

fn optional<T: std::fmt::Display>(value: &Option<T>) -> String {
    value.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "NULL".to_string())
}

fn dskinfo(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let model = DskShapeModel::open(ctx.prefs.data_file(&params.filename("FROM")?))?;
    let segment = model.segment()?;
    let text = format!(
        "File = {}\nBody = {}\nSurface = {}\nFrame = {}\nVertices = {}\nPlates = {}\n\
         MinimumBounds = ({}, {}, {})\nMaximumBounds = ({}, {}, {})\n\
         MinimumRadius = {}\nMaximumRadius = {}\n",
        model.path()?.display(),
        optional(&segment.body),
        optional(&segment.surface),
        optional(&segment.frame),
        segment.vertex_count,
        segment.plate_count,
        segment.bounds_min[0],
        segment.bounds_min[1],
        segment.bounds_min[2],
        segment.bounds_max[0],
        segment.bounds_max[1],
        segment.bounds_max[2],
        segment.min_radius,
        segment.max_radius,
    );
    write_out(ctx.out, &text)
}
