//! Generators for synthetic cubes and foreign image files.
//!
//! Pixel patterns are predictable so tests can verify placement:
//! [`ramp_value`] is `band * 10000 + line * 100 + sample` (1-based).

use cube_common::{ByteOrder, PixelType};
use cube_store::{Buffer, Cube, CubeAttributes, Dimensions};
use std::path::Path;

/// Value of the ramp pattern at a 1-based position.
pub fn ramp_value(sample: usize, line: usize, band: usize) -> f64 {
    (band * 10000 + line * 100 + sample) as f64
}

/// A buffer covering `dims` filled with the ramp pattern.
pub fn ramp_buffer(dims: Dimensions) -> Buffer {
    let mut buffer = Buffer::new(dims);
    for b in 0..dims.bands {
        for l in 0..dims.lines {
            for s in 0..dims.samples {
                buffer.set(s, l, b, ramp_value(s + 1, l + 1, b + 1));
            }
        }
    }
    buffer
}

/// Creates a cube at `path` filled with a constant value.
pub fn create_constant_cube(path: &Path, dims: Dimensions, pixel_type: PixelType, value: f64) -> Cube {
    let mut cube = Cube::create(path, &CubeAttributes::new(dims, pixel_type)).expect("create test cube");
    let mut buffer = Buffer::new(dims);
    buffer.fill(value);
    cube.write(&buffer).expect("write test cube");
    cube
}

/// Creates a cube at `path` filled with the ramp pattern.
///
/// ```ignore
/// let dir = test_utils::temp_test_dir();
/// let cube = test_utils::create_test_cube(&dir.path().join("in.cub"), Dimensions::new(8, 8, 2), PixelType::Real);
/// ```
pub fn create_test_cube(path: &Path, dims: Dimensions, pixel_type: PixelType) -> Cube {
    let mut cube = Cube::create(path, &CubeAttributes::new(dims, pixel_type)).expect("create test cube");
    cube.write(&ramp_buffer(dims)).expect("write test cube");
    cube
}

/// Creates a cube holding `values` in band-major order.
pub fn create_cube_from_values(path: &Path, dims: Dimensions, pixel_type: PixelType, values: &[f64]) -> Cube {
    let mut cube = Cube::create(path, &CubeAttributes::new(dims, pixel_type)).expect("create test cube");
    let buffer = Buffer::from_data(dims, values.to_vec()).expect("values match dimensions");
    cube.write(&buffer).expect("write test cube");
    cube
}

/// Reads every pixel of a cube into a band-major vector.
pub fn read_all(cube: &mut Cube) -> Vec<f64> {
    let mut buffer = Buffer::new(cube.dimensions());
    cube.read(&mut buffer).expect("read test cube");
    buffer.data().to_vec()
}

// ============================================================================
// FITS
// ============================================================================

/// A single 80-byte FITS card.
pub fn fits_card(text: &str) -> String {
    format!("{text:<80.80}")
}

/// Builds a single-HDU FITS file. `cards` are placed after the mandatory
/// structural keywords; `data` is already big-endian.
pub fn fits_bytes(bitpix: i32, axes: &[usize], cards: &[&str], data: &[u8]) -> Vec<u8> {
    let mut header = String::new();
    header.push_str(&fits_card("SIMPLE  =                    T"));
    header.push_str(&fits_card(&format!("BITPIX  = {bitpix:>20}")));
    header.push_str(&fits_card(&format!("NAXIS   = {:>20}", axes.len())));
    for (i, n) in axes.iter().enumerate() {
        header.push_str(&fits_card(&format!("NAXIS{:<3}= {n:>20}", i + 1)));
    }
    for card in cards {
        header.push_str(&fits_card(card));
    }
    header.push_str(&fits_card("END"));

    let mut bytes = header.into_bytes();
    pad_to(&mut bytes, 2880, b' ');
    bytes.extend_from_slice(data);
    pad_to(&mut bytes, 2880, 0);
    bytes
}

/// The 64x64 BITPIX=16 test image with `raw[i, j] = i + j` where `i` is the
/// 0-based sample and `j` the 0-based line.
pub fn fits_diagonal_ramp(size: usize, cards: &[&str]) -> Vec<u8> {
    let mut data = Vec::with_capacity(size * size * 2);
    for j in 0..size {
        for i in 0..size {
            data.extend_from_slice(&((i + j) as i16).to_be_bytes());
        }
    }
    let mut all = vec!["BZERO   =                    0", "BSCALE  =                    1"];
    all.extend_from_slice(cards);
    fits_bytes(16, &[size, size], &all, &data)
}

// ============================================================================
// PDS3
// ============================================================================

/// Builds an attached PDS3 image with one IMAGE object. The label occupies
/// `label_records` records of `record_bytes` bytes; the image follows.
pub fn pds3_image_bytes(
    samples: usize,
    lines: usize,
    bands: usize,
    sample_bits: usize,
    sample_type: &str,
    extra: &str,
    data: &[u8],
) -> Vec<u8> {
    let record_bytes = samples * sample_bits / 8;
    let mut label_records = 1;
    loop {
        let label = pds3_label_text(
            record_bytes,
            label_records,
            samples,
            lines,
            bands,
            sample_bits,
            sample_type,
            extra,
        );
        if label.len() <= label_records * record_bytes {
            let mut bytes = label.into_bytes();
            bytes.resize(label_records * record_bytes, b' ');
            bytes.extend_from_slice(data);
            return bytes;
        }
        label_records += 1;
    }
}

#[allow(clippy::too_many_arguments)]
fn pds3_label_text(
    record_bytes: usize,
    label_records: usize,
    samples: usize,
    lines: usize,
    bands: usize,
    sample_bits: usize,
    sample_type: &str,
    extra: &str,
) -> String {
    format!(
        "PDS_VERSION_ID = PDS3\r\n\
         RECORD_TYPE = FIXED_LENGTH\r\n\
         RECORD_BYTES = {record_bytes}\r\n\
         FILE_RECORDS = {}\r\n\
         LABEL_RECORDS = {label_records}\r\n\
         ^IMAGE = {}\r\n\
         {extra}\
         OBJECT = IMAGE\r\n\
         \x20 LINES = {lines}\r\n\
         \x20 LINE_SAMPLES = {samples}\r\n\
         \x20 BANDS = {bands}\r\n\
         \x20 BAND_STORAGE_TYPE = BAND_SEQUENTIAL\r\n\
         \x20 SAMPLE_BITS = {sample_bits}\r\n\
         \x20 SAMPLE_TYPE = {sample_type}\r\n\
         END_OBJECT = IMAGE\r\n\
         END\r\n",
        label_records + lines * bands,
        label_records + 1,
    )
}

// ============================================================================
// VICAR
// ============================================================================

/// Builds a VICAR file. `items` are extra `KEY=VALUE` items appended to the
/// system label; the label is padded to a whole number of records.
pub fn vicar_bytes(
    format: &str,
    org: &str,
    (samples, lines, bands): (usize, usize, usize),
    nbb: usize,
    items: &str,
    data: &[u8],
) -> Vec<u8> {
    let width = match format {
        "BYTE" => 1,
        "HALF" => 2,
        "FULL" | "REAL" => 4,
        "DOUB" => 8,
        _ => 1,
    };
    let recsize = match org {
        "BIP" => bands * samples * width + nbb,
        _ => samples * width + nbb,
    };
    let body = |lblsize: usize| {
        format!(
            "LBLSIZE={lblsize:<10}FORMAT='{format}'  TYPE='IMAGE'  BUFSIZ=20480  DIM=3  EOL=0  \
             RECSIZE={recsize}  ORG='{org}'  NL={lines}  NS={samples}  NB={bands}  N1={samples}  \
             N2={lines}  N3={bands}  N4=0  NBB={nbb}  NLB=0  HOST='JAVA'  INTFMT='HIGH'  REALFMT='IEEE'  {items}"
        )
    };
    let mut lblsize = recsize;
    while body(lblsize).len() > lblsize {
        lblsize += recsize;
    }
    let mut bytes = body(lblsize).into_bytes();
    bytes.resize(lblsize, 0);
    bytes.extend_from_slice(data);
    bytes
}

// ============================================================================
// DDD
// ============================================================================

/// Builds a DDD file: 1024-byte big-endian header then pixel data.
pub fn ddd_bytes(lines: u32, bytes_per_line: u32, bit_type: u32, data: &[u8]) -> Vec<u8> {
    let mut bytes = vec![0u8; 1024];
    bytes[0..4].copy_from_slice(&1659u32.to_be_bytes());
    bytes[4..8].copy_from_slice(&lines.to_be_bytes());
    bytes[8..12].copy_from_slice(&bytes_per_line.to_be_bytes());
    bytes[28..32].copy_from_slice(&bit_type.to_be_bytes());
    bytes.extend_from_slice(data);
    bytes
}

// ============================================================================
// Raw helpers
// ============================================================================

/// Encode `u16` values at a byte order.
pub fn u16_bytes(values: &[u16], order: ByteOrder) -> Vec<u8> {
    values
        .iter()
        .flat_map(|v| match order {
            ByteOrder::Msb => v.to_be_bytes(),
            ByteOrder::Lsb => v.to_le_bytes(),
        })
        .collect()
}

/// Encode `f32` values at a byte order.
pub fn f32_bytes(values: &[f32], order: ByteOrder) -> Vec<u8> {
    values
        .iter()
        .flat_map(|v| match order {
            ByteOrder::Msb => v.to_be_bytes(),
            ByteOrder::Lsb => v.to_le_bytes(),
        })
        .collect()
}

fn pad_to(bytes: &mut Vec<u8>, block: usize, fill: u8) {
    let rem = bytes.len() % block;
    if rem != 0 {
        bytes.resize(bytes.len() + block - rem, fill);
    }
}
