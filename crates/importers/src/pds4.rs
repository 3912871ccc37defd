//! PDS4 XML labels describing `Array_2D*`/`Array_3D*` products.

use std::path::Path;

use cube_common::{ByteOrder, CubeError, PixelType, Result, SpecialPixel, SpecialRanges};
use cube_store::{Dimensions, LabelGrammar, OriginalLabel};
use label::{xml, Container, Traverse};

use crate::detect::ForeignFormat;
use crate::foreign::{optional_count, optional_f64, required, required_count, required_int, DataLocation, ForeignImage};
use crate::layout::{ImportLayout, Organization};

/// Map a PDS4 `data_type`.
pub fn data_type(name: &str) -> Result<(PixelType, ByteOrder)> {
    let pair = match name.trim() {
        "UnsignedByte" => (PixelType::UnsignedByte, ByteOrder::Msb),
        "UnsignedMSB2" => (PixelType::UnsignedWord, ByteOrder::Msb),
        "UnsignedLSB2" => (PixelType::UnsignedWord, ByteOrder::Lsb),
        "SignedMSB2" => (PixelType::SignedWord, ByteOrder::Msb),
        "SignedLSB2" => (PixelType::SignedWord, ByteOrder::Lsb),
        "SignedMSB4" => (PixelType::SignedInteger, ByteOrder::Msb),
        "SignedLSB4" => (PixelType::SignedInteger, ByteOrder::Lsb),
        "IEEE754MSBSingle" => (PixelType::Real, ByteOrder::Msb),
        "IEEE754LSBSingle" => (PixelType::Real, ByteOrder::Lsb),
        "IEEE754MSBDouble" => (PixelType::Double, ByteOrder::Msb),
        "IEEE754LSBDouble" => (PixelType::Double, ByteOrder::Lsb),
        other => return Err(CubeError::unsupported_pixel_type(format!("PDS4 data_type {other}"))),
    };
    Ok(pair)
}

/// Storage organization from axis names ordered slowest to fastest.
pub fn axis_organization(axes: &[String]) -> Result<Organization> {
    let names: Vec<String> = axes.iter().map(|a| a.to_ascii_lowercase()).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    match names.as_slice() {
        ["line", "sample"] | ["band", "line", "sample"] => Ok(Organization::Bsq),
        ["line", "band", "sample"] => Ok(Organization::Bil),
        ["line", "sample", "band"] => Ok(Organization::Bip),
        other => Err(CubeError::user(format!("unsupported PDS4 axis order {other:?}"))),
    }
}

fn find_array(area: &Container) -> Option<&Container> {
    area.objects().find(|o| {
        let name = o.name.to_ascii_lowercase();
        name.starts_with("array_2d") || name.starts_with("array_3d")
    })
}

fn special_constants(array: &Container) -> Result<SpecialRanges> {
    let mut specials = SpecialRanges::new();
    let Ok(constants) = array.object("Special_Constants", Traverse::CurrentLevel) else {
        return Ok(specials);
    };
    for (name, class) in [
        ("missing_constant", SpecialPixel::Null),
        ("invalid_constant", SpecialPixel::Null),
        ("saturated_constant", SpecialPixel::Hrs),
        ("high_representation_saturation", SpecialPixel::Hrs),
        ("high_instrument_saturation", SpecialPixel::His),
        ("low_representation_saturation", SpecialPixel::Lrs),
        ("low_instrument_saturation", SpecialPixel::Lis),
    ] {
        let already = match class {
            SpecialPixel::Null => specials.null,
            SpecialPixel::Hrs => specials.hrs,
            SpecialPixel::His => specials.his,
            SpecialPixel::Lrs => specials.lrs,
            SpecialPixel::Lis => specials.lis,
        };
        if already.is_some() {
            continue;
        }
        if let Some(v) = optional_f64(constants, name)? {
            specials = specials.with(class, v, v);
        }
    }
    Ok(specials)
}

/// Describe the image of a PDS4 product. The data file named in
/// `File_Area_Observational` is resolved next to the label unless
/// `data_file` is given.
pub fn read_header(bytes: &[u8], label_path: &Path, data_file: Option<&Path>) -> Result<ForeignImage> {
    let text = String::from_utf8_lossy(bytes);
    let label = xml::from_generic_xml(&text)?;

    let area = label
        .object("File_Area_Observational", Traverse::DepthFirst)
        .map_err(|_| CubeError::user(format!("{} has no File_Area_Observational", label_path.display())))?;
    let file = area
        .object("File", Traverse::CurrentLevel)
        .map_err(|_| CubeError::user("File_Area_Observational has no File"))?;
    let file_name = required(file, "file_name")?;
    let array = find_array(area)
        .ok_or_else(|| CubeError::user("File_Area_Observational holds no Array_2D or Array_3D object"))?;

    let mut axes: Vec<(i64, String, usize)> = Vec::new();
    for axis in array.objects_named("Axis_Array") {
        axes.push((
            required_int(axis, "sequence_number")?,
            required(axis, "axis_name")?.to_string(),
            required_count(axis, "elements")?,
        ));
    }
    axes.sort_by_key(|(sequence, _, _)| *sequence);
    let names: Vec<String> = axes.iter().map(|(_, name, _)| name.clone()).collect();
    let organization = axis_organization(&names)?;
    let size = |axis: &str| {
        axes.iter()
            .find(|(_, name, _)| name.eq_ignore_ascii_case(axis))
            .map_or(1, |(_, _, n)| *n)
    };
    let dimensions = Dimensions::new(size("sample"), size("line"), size("band"));

    let element = array
        .object("Element_Array", Traverse::CurrentLevel)
        .map_err(|_| CubeError::user(format!("{} has no Element_Array", array.name)))?;
    let (pixel_type, order) = data_type(required(element, "data_type")?)?;

    let layout = ImportLayout::new(dimensions, pixel_type, order)
        .with_organization(organization)
        .with_file_header(optional_count(array, "offset", 0)? as u64)
        .with_scaling(
            optional_f64(element, "value_offset")?.unwrap_or(0.0),
            optional_f64(element, "scaling_factor")?.unwrap_or(1.0),
        )
        .with_specials(special_constants(array)?);

    let data_path = match data_file {
        Some(path) => path.to_path_buf(),
        None => crate::pds3::resolve_data_file(label_path, file_name)?,
    };

    Ok(ForeignImage {
        format: ForeignFormat::Pds4,
        layout,
        data: DataLocation::Detached(data_path),
        original: OriginalLabel::new(LabelGrammar::Xml, bytes.to_vec()),
        label,
    })
}
