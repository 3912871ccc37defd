//! Foreign-format importers: fits2cube, pds2cube, vicar2cube, ddd2cube and
//! raw2cube.

use crate::{write_out, App, AppContext};
use cube_common::{
    AppDefinition, ByteOrder, ParameterDef, ParameterKind, Parameters, PixelType, Result, SpecialPixel,
    SpecialRanges,
};
use cube_store::Dimensions;
use importers::{ForeignFormat, ImportLayout, ImportOptions, ImportResult, Importer, Organization};
use translate::TemplateStore;

const PIXEL_TYPES: [&str; 6] = [
    "UnsignedByte",
    "SignedWord",
    "UnsignedWord",
    "SignedInteger",
    "Real",
    "Double",
];

fn choice(values: &[&str]) -> ParameterKind {
    ParameterKind::Choice(values.iter().map(|v| v.to_string()).collect())
}

fn output_type() -> ParameterDef {
    let mut values = vec!["Auto"];
    values.extend(PIXEL_TYPES);
    ParameterDef::new("TYPE", choice(&values), "Output pixel type; Auto uses the configured import type")
        .default_value("Auto")
}

fn base(name: &str, description: &str) -> AppDefinition {
    AppDefinition::new(name, description)
        .param(ParameterDef::new("FROM", ParameterKind::Filename, "Input file").required())
        .param(ParameterDef::new("TO", ParameterKind::Filename, "Output cube").required())
        .param(output_type())
}

pub(crate) fn apps() -> Vec<App> {
    vec![
        App::new(
            base("fits2cube", "Import a FITS image").param(ParameterDef::new(
                "HDU",
                ParameterKind::Integer,
                "HDU index (0 is the primary); first image HDU when unset",
            )),
            fits2cube,
        ),
        App::new(
            base("pds2cube", "Import a PDS3 image or qube, or a PDS4 array").param(ParameterDef::new(
                "IMAGE",
                ParameterKind::Filename,
                "Detached data file overriding the label pointer",
            )),
            pds2cube,
        ),
        App::new(base("vicar2cube", "Import a VICAR image"), vicar2cube),
        App::new(base("ddd2cube", "Import a DDD image"), ddd2cube),
        App::new(raw_definition(), raw2cube),
    ]
}

fn options(params: &Parameters) -> Result<ImportOptions> {
    let mut options = ImportOptions::default();
    let name = params.string("TYPE")?;
    if !name.eq_ignore_ascii_case("Auto") {
        options = options.with_pixel_type(PixelType::from_name(&name)?);
    }
    Ok(options)
}

fn importer<'a>(ctx: &AppContext<'a>) -> Result<Importer<'a>> {
    let templates = TemplateStore::resolve(None, ctx.prefs)?;
    Ok(Importer::new(ctx.prefs, templates))
}

fn report(ctx: &mut AppContext<'_>, result: &ImportResult) -> Result<()> {
    let mut text = format!(
        "Format = {}\nDimensions = {}\nInputType = {}\nOutputType = {}\nOrganization = {}\n",
        result.format,
        result.dimensions,
        result.input_pixel_type,
        result.output_pixel_type,
        result.organization.as_str()
    );
    if !result.groups.is_empty() {
        text.push_str(&format!("Groups = ({})\n", result.groups.join(", ")));
    }
    if !result.tables.is_empty() {
        text.push_str(&format!("Tables = ({})\n", result.tables.join(", ")));
    }
    write_out(ctx.out, &text)
}

fn import_as(params: &Parameters, ctx: &mut AppContext<'_>, options: ImportOptions) -> Result<()> {
    let result = importer(ctx)?.import_file(&params.filename("FROM")?, &params.filename("TO")?, &options)?;
    report(ctx, &result)
}

fn fits2cube(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let mut options = options(params)?.with_format(ForeignFormat::Fits);
    if params.has("HDU") {
        options = options.with_hdu(params.integer("HDU")?.max(0) as usize);
    }
    import_as(params, ctx, options)
}

fn pds2cube(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    // PDS3 and PDS4 labels are told apart by content.
    let mut options = options(params)?;
    if params.has("IMAGE") {
        options = options.with_data_file(params.filename("IMAGE")?);
    }
    let from = params.filename("FROM")?;
    let (image, _) = importer(ctx)?.describe(&from, &options)?;
    if !matches!(image.format, ForeignFormat::Pds3 | ForeignFormat::Pds4) {
        return Err(cube_common::CubeError::user(format!(
            "{} is a {} file, not PDS",
            from.display(),
            image.format
        )));
    }
    import_as(params, ctx, options.with_format(image.format))
}

fn vicar2cube(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let options = options(params)?.with_format(ForeignFormat::Vicar);
    import_as(params, ctx, options)
}

fn ddd2cube(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let options = options(params)?.with_format(ForeignFormat::Ddd);
    import_as(params, ctx, options)
}

fn raw_definition() -> AppDefinition {
    base("raw2cube", "Import headerless raw pixels")
        .param(ParameterDef::new("SAMPLES", ParameterKind::Integer, "Samples per line").required())
        .param(ParameterDef::new("LINES", ParameterKind::Integer, "Lines per band").required())
        .param(ParameterDef::new("BANDS", ParameterKind::Integer, "Band count").default_value("1"))
        .param(ParameterDef::new("BITTYPE", choice(&PIXEL_TYPES), "Stored pixel type").default_value("Real"))
        .param(ParameterDef::new("BYTEORDER", choice(&["Lsb", "Msb"]), "Stored byte order").default_value("Lsb"))
        .param(
            ParameterDef::new("ORGANIZATION", choice(&["BSQ", "BIL", "BIP"]), "Band organization")
                .default_value("BSQ"),
        )
        .param(ParameterDef::new("SKIP", ParameterKind::Integer, "File header bytes").default_value("0"))
        .param(ParameterDef::new("BASE", ParameterKind::Double, "Scaling base").default_value("0.0"))
        .param(ParameterDef::new("MULTIPLIER", ParameterKind::Double, "Scaling multiplier").default_value("1.0"))
        .param(ParameterDef::new("NULLMIN", ParameterKind::Double, "Lowest raw value read as NULL"))
        .param(ParameterDef::new("NULLMAX", ParameterKind::Double, "Highest raw value read as NULL"))
}

fn dimension(params: &Parameters, name: &str) -> Result<usize> {
    let n = params.integer(name)?;
    usize::try_from(n).map_err(|_| cube_common::CubeError::user(format!("{name} = {n} must not be negative")))
}

fn raw2cube(params: &Parameters, ctx: &mut AppContext<'_>) -> Result<()> {
    let dims = Dimensions::new(
        dimension(params, "SAMPLES")?,
        dimension(params, "LINES")?,
        dimension(params, "BANDS")?,
    );
    let mut layout = ImportLayout::new(
        dims,
        PixelType::from_name(&params.string("BITTYPE")?)?,
        ByteOrder::from_name(&params.string("BYTEORDER")?)?,
    )
    .with_organization(Organization::from_name(&params.string("ORGANIZATION")?)?)
    .with_file_header(dimension(params, "SKIP")? as u64)
    .with_scaling(params.double("BASE")?, params.double("MULTIPLIER")?);

    if params.has("NULLMIN") || params.has("NULLMAX") {
        let min = if params.has("NULLMIN") { params.double("NULLMIN")? } else { params.double("NULLMAX")? };
        let max = if params.has("NULLMAX") { params.double("NULLMAX")? } else { min };
        layout = layout.with_specials(SpecialRanges::new().with(SpecialPixel::Null, min, max));
    }

    let result = importer(ctx)?.import_raw(&params.filename("FROM")?, layout, &params.filename("TO")?, &options(params)?)?;
    report(ctx, &result)
}
