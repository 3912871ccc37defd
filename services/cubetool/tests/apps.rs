//! End-to-end runs of cubetool applications.

use cube_common::special::is_null;
use cube_common::{ErrorKind, PixelType, Preferences};
use cube_store::{Cube, Dimensions};
use label::Traverse;
use std::fs;
use std::path::Path;
use test_utils::{
    create_constant_cube, create_cube_from_values, fits_diagonal_ramp, octahedron_plate_text, read_all,
    temp_test_dir,
};

fn run(app: &str, args: &[String]) -> cube_common::Result<String> {
    let prefs = Preferences::default();
    let mut out = Vec::new();
    cubetool::run(app, args, &prefs, &mut out)?;
    Ok(String::from_utf8(out).unwrap())
}

fn arg(key: &str, path: &Path) -> String {
    format!("{}={}", key, path.display())
}

#[test]
fn test_every_app_is_registered() {
    let names: Vec<String> = cubetool::registry().iter().map(|a| a.name().to_string()).collect();
    for expected in [
        "fits2cube",
        "pds2cube",
        "vicar2cube",
        "ddd2cube",
        "raw2cube",
        "flatfield",
        "lognegative",
        "bandtrim",
        "grid",
        "dskinfo",
        "labels",
        "mosaic",
    ] {
        assert!(names.iter().any(|n| n == expected), "{expected} missing");
    }
}

#[test]
fn test_unknown_app_and_missing_parameter_are_user_errors() {
    let err = run("cubeit", &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert_eq!(err.exit_code(), 1);

    let err = run("bandtrim", &["FROM=in.cub".to_string()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert!(err.to_string().contains("TO"));
}

#[test]
fn test_fits2cube_then_labels() {
    let dir = temp_test_dir();
    let fits = dir.path().join("ramp.fits");
    let cube = dir.path().join("ramp.cub");
    fs::write(&fits, fits_diagonal_ramp(16, &["INSTRUME= 'ISS NAC '"])).unwrap();

    let report = run("fits2cube", &[arg("FROM", &fits), arg("TO", &cube), "TYPE=SignedWord".into()]).unwrap();
    assert!(report.contains("Format = FITS"));
    assert!(report.contains("OutputType = SignedWord"));

    let mut out = Cube::open_read(&cube).unwrap();
    assert_eq!(read_all(&mut out)[17], 2.0);

    let text = run("labels", &[arg("FROM", &cube)]).unwrap();
    assert!(text.contains("Object = IsisCube"));
    let original = run("labels", &[arg("FROM", &cube), "ORIGINAL=yes".into()]).unwrap();
    assert!(original.starts_with("SIMPLE  ="));
    let xml = run("labels", &[arg("FROM", &cube), "FORMAT=xml".into()]).unwrap();
    assert!(xml.contains("<Object name=\"IsisCube\">"));
}

#[test]
fn test_fits2cube_rejects_other_formats() {
    let dir = temp_test_dir();
    let input = dir.path().join("noise.fits");
    fs::write(&input, vec![7u8; 100]).unwrap();
    let output = dir.path().join("out.cub");
    let err = run("fits2cube", &[arg("FROM", &input), arg("TO", &output)]).unwrap_err();
    assert_eq!(err.exit_code(), 1);
    assert!(!output.exists());
}

#[test]
fn test_raw2cube_with_null_range() {
    let dir = temp_test_dir();
    let raw = dir.path().join("image.raw");
    let mut bytes = vec![0u8; 4];
    for v in [1u16, 2, 0xFFFF, 4] {
        bytes.extend_from_slice(&v.to_be_bytes());
    }
    fs::write(&raw, bytes).unwrap();
    let cube = dir.path().join("image.cub");

    run(
        "raw2cube",
        &[
            arg("FROM", &raw),
            arg("TO", &cube),
            "SAMPLES=2".into(),
            "LINES=2".into(),
            "BITTYPE=UnsignedWord".into(),
            "BYTEORDER=Msb".into(),
            "SKIP=4".into(),
            "MULTIPLIER=10".into(),
            "NULLMIN=65535".into(),
        ],
    )
    .unwrap();
    let mut out = Cube::open_read(&cube).unwrap();
    let values = read_all(&mut out);
    assert_eq!(values[0], 10.0);
    assert_eq!(values[1], 20.0);
    assert!(is_null(values[2]));
    assert_eq!(values[3], 40.0);
}

#[test]
fn test_flatfield_adds_radiometry() {
    let dir = temp_test_dir();
    let dims = Dimensions::new(2, 2, 1);
    let input = dir.path().join("in.cub");
    let flat = dir.path().join("flat.cub");
    let dark = dir.path().join("dark.cub");
    let output = dir.path().join("out.cub");
    create_constant_cube(&input, dims, PixelType::Real, 100.0).close().unwrap();
    create_constant_cube(&flat, dims, PixelType::Real, 2.0).close().unwrap();
    create_constant_cube(&dark, dims, PixelType::Real, 10.0).close().unwrap();

    let report = run(
        "flatfield",
        &[arg("FROM", &input), arg("FLAT", &flat), arg("DARK", &dark), arg("TO", &output)],
    )
    .unwrap();
    assert!(report.starts_with("Tiles = "));

    let mut cube = Cube::open_read(&output).unwrap();
    assert_eq!(read_all(&mut cube), vec![45.0; 4]);
    let radiometry = cube.group("Radiometry").unwrap();
    assert!(radiometry
        .keyword_value("FlatFile", Traverse::CurrentLevel)
        .unwrap()
        .ends_with("flat.cub"));
}

#[test]
fn test_bandtrim_and_lognegative() {
    let dir = temp_test_dir();
    let input = dir.path().join("in.cub");
    let trimmed = dir.path().join("trimmed.cub");
    let null = cube_common::special::NULL;
    create_cube_from_values(&input, Dimensions::new(2, 1, 2), PixelType::Real, &[0.0, 1.0, null, 65280.0])
        .close()
        .unwrap();

    run("bandtrim", &[arg("FROM", &input), arg("TO", &trimmed)]).unwrap();
    let mut cube = Cube::open_read(&trimmed).unwrap();
    let values = read_all(&mut cube);
    assert_eq!(values[1], 1.0);
    assert_eq!(values[3], 65280.0);
    assert!(is_null(values[0]) && is_null(values[2]));

    let calibrated = dir.path().join("cal.cub");
    run("lognegative", &[arg("FROM", &trimmed), arg("TO", &calibrated), "DARKCURRENT=0".into()]).unwrap();
    let mut cube = Cube::open_read(&calibrated).unwrap();
    let values = read_all(&mut cube);
    assert!(is_null(values[0]));
    assert!((values[3] - 32767.5).abs() < 1e-3);
}

#[test]
fn test_grid_writes_gml() {
    let dir = temp_test_dir();
    let map = dir.path().join("map.pvl");
    fs::write(
        &map,
        "Group = Mapping\n  ProjectionName = SimpleCylindrical\n  EquatorialRadius = 1737400.0\n  \
         MinimumLatitude = -30.0\n  MaximumLatitude = 30.0\n  MinimumLongitude = 0.0\n  \
         MaximumLongitude = 90.0\nEnd_Group\nEnd\n",
    )
    .unwrap();
    let gml = dir.path().join("grid.gml");
    let report = run(
        "grid",
        &[arg("MAP", &map), arg("TO", &gml), "LATINC=30".into(), "LONINC=45".into(), "STEP=5".into()],
    )
    .unwrap();
    // Latitudes -30, 0, 30 and longitudes 0, 45, 90.
    assert!(report.contains("Lines = 6"));
    let text = fs::read_to_string(&gml).unwrap();
    assert_eq!(text.matches("<gml:featureMember>").count(), 6);

    let err = run("grid", &[arg("MAP", &map), arg("TO", &gml), "MINLAT=0".into()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
}

#[test]
fn test_dskinfo() {
    let dir = temp_test_dir();
    let kernel = dir.path().join("octa.plt");
    fs::write(&kernel, format!("# body = 401\n{}", octahedron_plate_text(10.0))).unwrap();
    let text = run("dskinfo", &[arg("FROM", &kernel)]).unwrap();
    assert!(text.contains("Body = 401"));
    assert!(text.contains("Plates = 8"));
    assert!(text.contains("Vertices = 6"));
    assert!(text.contains("MaximumRadius = 10"));

    let err = run("dskinfo", &["FROM=/not/here/vesta.plt".to_string()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
}

#[test]
fn test_mosaic_places_input_with_priority() {
    let dir = temp_test_dir();
    let input = dir.path().join("in.cub");
    let mosaic = dir.path().join("mos.cub");
    create_constant_cube(&input, Dimensions::new(2, 2, 1), PixelType::Real, 5.0).close().unwrap();
    let null = cube_common::special::NULL;
    create_cube_from_values(
        &mosaic,
        Dimensions::new(3, 2, 1),
        PixelType::Real,
        &[null, 9.0, 9.0, null, 9.0, 9.0],
    )
    .close()
    .unwrap();

    let out = run(
        "mosaic",
        &[arg("FROM", &input), arg("MOSAIC", &mosaic), "OUTSAMPLE=2".into(), "PRIORITY=Mosaic".into()],
    )
    .unwrap();
    assert!(out.contains("StartSample = 2"));
    assert!(out.contains("Changed = 0"));

    let out = run("mosaic", &[arg("FROM", &input), arg("MOSAIC", &mosaic), "OUTSAMPLE=0".into()]).unwrap();
    assert!(out.contains("Changed = 2"));
    let mut cube = Cube::open_read(&mosaic).unwrap();
    assert_eq!(read_all(&mut cube), [5.0, 9.0, 9.0, 5.0, 9.0, 9.0]);

    let err = run("mosaic", &[arg("FROM", &input), arg("MOSAIC", &mosaic), "OUTLINE=3".into()]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
}
