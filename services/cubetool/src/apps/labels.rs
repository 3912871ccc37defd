//! labels: print a cube's label or its original foreign label.

use crate::{write_out, App, AppContext};
use cube_common::{AppDefinition, ParameterDef, ParameterKind, Parameters, Result};
use label::{pvl, xml};

pub(crate) fn app() -> App {
    let definition = AppDefinition::new("labels", "Print the label of a cube")
        .param(ParameterDef::new("FROM", ParameterKind::Filename, "Input cube").required())
        .param(
            ParameterDef::new("FORMAT", ParameterKind::Choice(vec!["PVL".into(), "XML".into()]), "Output grammar")
                .default_value("PVL"),
        )
        .param(
            ParameterDef::new("ORIGINAL", ParameterKind::Boolean, "Print the original label text instead")
                .default_value("no"),
        );
    App::new(definition, labels)
}

fn labels(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let cube = ctx.open_cube(&params.filename("FROM")?)?;
    if params.boolean("ORIGINAL")? {
        let mut text = cube.original_label()?.text();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        return write_out(ctx.out, &text);
    }
    let text = match params.string("FORMAT")?.as_str() {
        "XML" => xml::emit(cube.label())?,
        _ => pvl::emit(cube.label()),
    };
    write_out(ctx.out, &text)
}
