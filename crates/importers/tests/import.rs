//! End-to-end imports of synthetic foreign files.

use std::fs;
use std::io::Write;

use cube_common::special::is_null;
use cube_common::{ByteOrder, ErrorKind, PixelType, Preferences};
use cube_store::{Cube, Dimensions, LabelGrammar};
use flate2::write::GzEncoder;
use flate2::Compression;
use importers::{ForeignFormat, ImportLayout, ImportOptions, Importer, Organization};
use label::Traverse;
use test_utils::{
    ddd_bytes, f32_bytes, fits_card, fits_diagonal_ramp, pds3_image_bytes, read_all, temp_test_dir, u16_bytes,
    vicar_bytes,
};

fn fits_cards() -> [&'static str; 3] {
    [
        "INSTRUME= 'ISS NAC '",
        "OBSERVER= 'C. Porco'",
        "DATE-OBS= '2004-06-11T19:32:00'",
    ]
}

#[test]
fn test_fits_diagonal_ramp_import() {
    let dir = temp_test_dir();
    let input = dir.path().join("ramp.fits");
    let output = dir.path().join("ramp.cub");
    fs::write(&input, fits_diagonal_ramp(64, &fits_cards())).unwrap();

    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let result = importer.import_file(&input, &output, &ImportOptions::default()).unwrap();
    assert_eq!(result.format, ForeignFormat::Fits);
    assert_eq!(result.dimensions, Dimensions::new(64, 64, 1));
    assert_eq!(result.input_pixel_type, PixelType::SignedWord);
    assert_eq!(result.output_pixel_type, PixelType::Real);
    assert_eq!(result.tiles, 64);

    let mut cube = Cube::open_read(&output).unwrap();
    assert_eq!(cube.pixel_type(), PixelType::Real);
    let values = read_all(&mut cube);
    for j in 0..64 {
        for i in 0..64 {
            assert_eq!(values[j * 64 + i], (i + j) as f64, "pixel ({i}, {j})");
        }
    }

    let original = cube.original_label().unwrap();
    assert_eq!(original.grammar, LabelGrammar::Fits);
    let cards = original.parse().unwrap();
    assert_eq!(cards.keyword_value("BITPIX", Traverse::CurrentLevel).unwrap(), "16");

    let instrument = cube.group("Instrument").unwrap();
    assert_eq!(instrument.keyword_value("InstrumentId", Traverse::CurrentLevel).unwrap(), "ISS NAC");
    assert_eq!(instrument.keyword_value("Observer", Traverse::CurrentLevel).unwrap(), "C. Porco");
    assert_eq!(
        instrument.keyword_value("StartTime", Traverse::CurrentLevel).unwrap(),
        "2004-06-11T19:32:00"
    );
}

#[test]
fn test_gzip_fits_with_output_type_override() {
    let dir = temp_test_dir();
    let input = dir.path().join("ramp.fits.gz");
    let output = dir.path().join("ramp.cub");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&fits_diagonal_ramp(8, &[])).unwrap();
    fs::write(&input, encoder.finish().unwrap()).unwrap();

    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let options = ImportOptions::default().with_pixel_type(PixelType::SignedWord);
    let result = importer.import_file(&input, &output, &options).unwrap();
    assert_eq!(result.output_pixel_type, PixelType::SignedWord);

    let mut cube = Cube::open_read(&output).unwrap();
    assert_eq!(cube.pixel_type(), PixelType::SignedWord);
    assert_eq!(read_all(&mut cube)[8 * 7 + 7], 14.0);
}

#[test]
fn test_pds3_attached_image() {
    let dir = temp_test_dir();
    let input = dir.path().join("frame.img");
    let output = dir.path().join("frame.cub");
    let values: Vec<u16> = (0..12).map(|v| v * 3).collect();
    let extra = "SPACECRAFT_NAME = \"CASSINI_ORBITER\"\r\nINSTRUMENT_ID = ISSNA\r\n";
    let bytes = pds3_image_bytes(4, 3, 1, 16, "LSB_UNSIGNED_INTEGER", extra, &u16_bytes(&values, ByteOrder::Lsb));
    fs::write(&input, bytes).unwrap();

    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let result = importer.import_file(&input, &output, &ImportOptions::default()).unwrap();
    assert_eq!(result.format, ForeignFormat::Pds3);
    assert_eq!(result.input_pixel_type, PixelType::UnsignedWord);

    let mut cube = Cube::open_read(&output).unwrap();
    let expected: Vec<f64> = values.iter().map(|v| *v as f64).collect();
    assert_eq!(read_all(&mut cube), expected);
    assert_eq!(cube.original_label().unwrap().grammar, LabelGrammar::Pvl);
    let instrument = cube.group("Instrument").unwrap();
    assert_eq!(
        instrument.keyword_value("SpacecraftName", Traverse::CurrentLevel).unwrap(),
        "Cassini-Huygens"
    );
    assert_eq!(instrument.keyword_value("InstrumentId", Traverse::CurrentLevel).unwrap(), "ISSNA");
}

#[test]
fn test_vicar_bil_with_binary_prefix() {
    let dir = temp_test_dir();
    let input = dir.path().join("frame.vic");
    let output = dir.path().join("frame.cub");
    let (ns, nl, nb) = (4usize, 2usize, 3usize);
    let mut data = Vec::new();
    for line in 0..nl {
        for band in 0..nb {
            data.extend_from_slice(&[0xEE, (line * nb + band) as u8]);
            let row: Vec<u16> = (0..ns).map(|s| (band * 100 + line * 10 + s) as u16).collect();
            data.extend(u16_bytes(&row, ByteOrder::Msb));
        }
    }
    fs::write(&input, vicar_bytes("HALF", "BIL", (ns, nl, nb), 2, "", &data)).unwrap();

    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let result = importer.import_file(&input, &output, &ImportOptions::default()).unwrap();
    assert_eq!(result.organization, Organization::Bil);
    assert_eq!(result.tables, vec!["DataPrefix".to_string()]);

    let mut cube = Cube::open_read(&output).unwrap();
    let values = read_all(&mut cube);
    for band in 0..nb {
        for line in 0..nl {
            for s in 0..ns {
                let at = (band * nl + line) * ns + s;
                assert_eq!(values[at], (band * 100 + line * 10 + s) as f64);
            }
        }
    }
    let prefix = cube.table("DataPrefix").unwrap();
    assert_eq!(prefix.len(), nl * nb);
    assert_eq!(cube.original_label().unwrap().grammar, LabelGrammar::Vicar);
}

#[test]
fn test_ddd_color_is_band_interleaved_by_pixel() {
    let dir = temp_test_dir();
    let input = dir.path().join("color.ddd");
    let output = dir.path().join("color.cub");
    let mut data = Vec::new();
    for line in 0..2u16 {
        for s in 0..2u16 {
            for band in 0..3u16 {
                data.extend_from_slice(&(1000 + line * 100 + s * 10 + band).to_be_bytes());
            }
        }
    }
    fs::write(&input, ddd_bytes(2, 12, 48, &data)).unwrap();

    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let result = importer.import_file(&input, &output, &ImportOptions::default()).unwrap();
    assert_eq!(result.dimensions, Dimensions::new(2, 2, 3));
    assert!(result.groups.is_empty());

    let mut cube = Cube::open_read(&output).unwrap();
    let values = read_all(&mut cube);
    // Band 3, line 2, sample 1.
    assert_eq!(values[(2 * 2 + 1) * 2], 1102.0);
}

#[test]
fn test_raw_import_with_header_and_nan() {
    let dir = temp_test_dir();
    let input = dir.path().join("pixels.raw");
    let output = dir.path().join("pixels.cub");
    let mut bytes = vec![0u8; 16];
    bytes.extend(f32_bytes(&[1.5, f32::NAN, -2.0, 8.0, 0.25, 3.0], ByteOrder::Lsb));
    fs::write(&input, bytes).unwrap();

    let layout = ImportLayout::new(Dimensions::new(3, 2, 1), PixelType::Real, ByteOrder::Lsb).with_file_header(16);
    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let result = importer
        .import_raw(&input, layout, &output, &ImportOptions::default())
        .unwrap();
    assert_eq!(result.format, ForeignFormat::Raw);

    let mut cube = Cube::open_read(&output).unwrap();
    let values = read_all(&mut cube);
    assert_eq!(values[0], 1.5);
    assert!(is_null(values[1]));
    assert_eq!(&values[2..], &[-2.0, 8.0, 0.25, 3.0]);
    assert!(cube.original_label().is_err());
}

#[test]
fn test_unknown_format_is_user_error() {
    let dir = temp_test_dir();
    let input = dir.path().join("mystery.bin");
    let output = dir.path().join("mystery.cub");
    fs::write(&input, b"\x00\x01\x02 nothing to see").unwrap();

    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let err = importer.import_file(&input, &output, &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert!(!output.exists());
}

#[test]
fn test_truncated_pixels_remove_partial_output() {
    let dir = temp_test_dir();
    let input = dir.path().join("short.fits");
    let output = dir.path().join("short.cub");
    let mut bytes = fits_diagonal_ramp(16, &[]);
    bytes.truncate(2880 + 100);
    fs::write(&input, bytes).unwrap();

    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let err = importer.import_file(&input, &output, &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert!(err.to_string().contains("short.fits"));
    assert!(!output.exists());
}

fn fits_header(cards: &[&str]) -> Vec<u8> {
    let mut text: String = cards.iter().chain(["END"].iter()).map(|card| fits_card(card)).collect();
    text.push_str(&" ".repeat(2880 - text.len()));
    let mut bytes = text.into_bytes();
    bytes.extend([0u8; 64]);
    bytes
}

#[test]
fn test_negative_fits_axis_is_parse_error() {
    let dir = temp_test_dir();
    let input = dir.path().join("negative.fits");
    let output = dir.path().join("negative.cub");
    fs::write(
        &input,
        fits_header(&[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =                   -4",
            "NAXIS2  =                    4",
        ]),
    )
    .unwrap();

    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let err = importer.import_file(&input, &output, &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(err.root().to_string().contains("NAXIS1"));
    assert!(!output.exists());
}

#[test]
fn test_oversized_headers_fail_before_output() {
    let dir = temp_test_dir();
    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();

    // Representable, but far larger than the file.
    let input = dir.path().join("huge.fits");
    let output = dir.path().join("huge.cub");
    fs::write(
        &input,
        fits_header(&[
            "SIMPLE  =                    T",
            "BITPIX  =                   16",
            "NAXIS   =                    2",
            "NAXIS1  =           1000000000",
            "NAXIS2  =           1000000000",
        ]),
    )
    .unwrap();
    let err = importer.import_file(&input, &output, &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert!(err.to_string().contains("huge.fits"));
    assert!(!output.exists());

    // Axis product does not fit in memory arithmetic at all.
    let input = dir.path().join("overflow.fits");
    let output = dir.path().join("overflow.cub");
    fs::write(
        &input,
        fits_header(&[
            "SIMPLE  =                    T",
            "BITPIX  =                  -64",
            "NAXIS   =                    2",
            "NAXIS1  =  4611686018427387904",
            "NAXIS2  =  4611686018427387904",
        ]),
    )
    .unwrap();
    let err = importer.import_file(&input, &output, &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(!output.exists());

    let input = dir.path().join("tall.img");
    let output = dir.path().join("tall.cub");
    fs::write(&input, pds3_image_bytes(8, 1 << 40, 1, 8, "UNSIGNED_INTEGER", "", &[0u8; 16])).unwrap();
    let err = importer.import_file(&input, &output, &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::User);
    assert!(!output.exists());
}

#[test]
fn test_negative_vicar_size_is_parse_error() {
    let dir = temp_test_dir();
    let input = dir.path().join("negative.vic");
    let output = dir.path().join("negative.cub");
    let bytes = vicar_bytes("BYTE", "BSQ", (4, 2, 1), 0, "", &[0u8; 8]);
    let text = String::from_utf8_lossy(&bytes)
        .replacen("NB=1", "NB=-1", 1)
        .replacen("  N4=0", "", 1);
    fs::write(&input, text.as_bytes()).unwrap();

    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let err = importer.import_file(&input, &output, &ImportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(!output.exists());
}

#[test]
fn test_raw_layout_overflow_is_rejected() {
    let dir = temp_test_dir();
    let input = dir.path().join("tiny.raw");
    let output = dir.path().join("tiny.cub");
    fs::write(&input, [0u8; 32]).unwrap();

    let layout = ImportLayout::new(Dimensions::new(usize::MAX / 2, 4, 1), PixelType::Double, ByteOrder::Lsb);
    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let err = importer
        .import_raw(&input, layout, &output, &ImportOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert!(!output.exists());
}

#[test]
fn test_pds4_detached_product() {
    let dir = temp_test_dir();
    let label_path = dir.path().join("scene.xml");
    let output = dir.path().join("scene.cub");
    let label = r#"<?xml version="1.0" encoding="UTF-8"?>
<Product_Observational>
  <Identification_Area>
    <logical_identifier>urn:nasa:pds:test:scene</logical_identifier>
    <version_id>2.0</version_id>
  </Identification_Area>
  <Observation_Area>
    <Target_Identification>
      <name>Phobos</name>
    </Target_Identification>
  </Observation_Area>
  <File_Area_Observational>
    <File>
      <file_name>scene.img</file_name>
    </File>
    <Array_2D_Image>
      <offset unit="byte">0</offset>
      <axes>2</axes>
      <Element_Array>
        <data_type>UnsignedMSB2</data_type>
      </Element_Array>
      <Axis_Array>
        <axis_name>Line</axis_name>
        <elements>2</elements>
        <sequence_number>1</sequence_number>
      </Axis_Array>
      <Axis_Array>
        <axis_name>Sample</axis_name>
        <elements>3</elements>
        <sequence_number>2</sequence_number>
      </Axis_Array>
      <Special_Constants>
        <missing_constant>0</missing_constant>
      </Special_Constants>
    </Array_2D_Image>
  </File_Area_Observational>
</Product_Observational>
"#;
    fs::write(&label_path, label).unwrap();
    fs::write(dir.path().join("scene.img"), u16_bytes(&[5, 0, 7, 9, 11, 13], ByteOrder::Msb)).unwrap();

    let prefs = Preferences::default();
    let importer = Importer::with_bundled_templates(&prefs).unwrap();
    let result = importer.import_file(&label_path, &output, &ImportOptions::default()).unwrap();
    assert_eq!(result.format, ForeignFormat::Pds4);

    let mut cube = Cube::open_read(&output).unwrap();
    let values = read_all(&mut cube);
    assert_eq!(values[0], 5.0);
    assert!(is_null(values[1]));
    assert_eq!(values[5], 13.0);

    let instrument = cube.group("Instrument").unwrap();
    assert_eq!(instrument.keyword_value("TargetName", Traverse::CurrentLevel).unwrap(), "Phobos");
    let archive = cube.group("Archive").unwrap();
    assert_eq!(archive.keyword_value("VersionId", Traverse::CurrentLevel).unwrap(), "2.0");
    assert_eq!(cube.original_label().unwrap().grammar, LabelGrammar::Xml);
}
