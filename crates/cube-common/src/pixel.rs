//! Pixel types, byte order and the raw <-> canonical codec.
//!
//! Raw storage holds integers or IEEE floats in either byte order. The codec
//! maps raw values to canonical `f64` pixels (`base + multiplier * raw`,
//! identity for float storage) and back, preserving each special class at
//! its native sentinel pattern.

use crate::error::{CubeError, Result};
use crate::special::{self, SpecialPixel};
use serde::{Deserialize, Serialize};

/// On-disk pixel types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    UnsignedByte,
    SignedWord,
    UnsignedWord,
    SignedInteger,
    Real,
    Double,
}

impl PixelType {
    /// Size of one pixel in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::UnsignedByte => 1,
            Self::SignedWord | Self::UnsignedWord => 2,
            Self::SignedInteger | Self::Real => 4,
            Self::Double => 8,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(self, Self::Real | Self::Double)
    }

    /// Name used in the `Core.Pixels.Type` keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsignedByte => "UnsignedByte",
            Self::SignedWord => "SignedWord",
            Self::UnsignedWord => "UnsignedWord",
            Self::SignedInteger => "SignedInteger",
            Self::Real => "Real",
            Self::Double => "Double",
        }
    }

    /// Parse a label name (case-insensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "unsignedbyte" => Ok(Self::UnsignedByte),
            "signedword" => Ok(Self::SignedWord),
            "unsignedword" => Ok(Self::UnsignedWord),
            "signedinteger" => Ok(Self::SignedInteger),
            "real" => Ok(Self::Real),
            "double" => Ok(Self::Double),
            other => Err(CubeError::unsupported_pixel_type(other.to_string())),
        }
    }

    /// Map a FITS `BITPIX` value.
    pub fn from_bitpix(bitpix: i64) -> Result<Self> {
        match bitpix {
            8 => Ok(Self::UnsignedByte),
            16 => Ok(Self::SignedWord),
            32 => Ok(Self::SignedInteger),
            -32 => Ok(Self::Real),
            -64 => Ok(Self::Double),
            other => Err(CubeError::unsupported_pixel_type(format!("BITPIX = {other}"))),
        }
    }

    /// Sentinel codes and valid range of an integer type, as
    /// `(null, lrs, lis, his, hrs, valid_min, valid_max)`.
    fn integer_codes(&self) -> Option<[i64; 7]> {
        match self {
            Self::UnsignedByte => Some([0, 1, 2, 3, 255, 4, 254]),
            Self::SignedWord => Some([-32768, -32767, -32766, -32765, -32764, -32752, 32767]),
            Self::UnsignedWord => Some([0, 1, 2, 65534, 65535, 3, 65522]),
            Self::SignedInteger => {
                let min = i32::MIN as i64;
                Some([min, min + 1, min + 2, min + 3, min + 4, min + 16, i32::MAX as i64])
            }
            Self::Real | Self::Double => None,
        }
    }

    /// Native sentinel of `class` for an integer type, as the raw integer.
    pub fn special_code(&self, class: SpecialPixel) -> Option<i64> {
        let codes = self.integer_codes()?;
        Some(match class {
            SpecialPixel::Null => codes[0],
            SpecialPixel::Lrs => codes[1],
            SpecialPixel::Lis => codes[2],
            SpecialPixel::His => codes[3],
            SpecialPixel::Hrs => codes[4],
        })
    }

    /// Valid raw range of an integer type.
    pub fn valid_range(&self) -> Option<(i64, i64)> {
        self.integer_codes().map(|c| (c[5], c[6]))
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Byte order of stored pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ByteOrder {
    Lsb,
    Msb,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Msb
        } else {
            Self::Lsb
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lsb => "Lsb",
            Self::Msb => "Msb",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "lsb" | "little" | "little_endian" => Ok(Self::Lsb),
            "msb" | "big" | "big_endian" => Ok(Self::Msb),
            other => Err(CubeError::parse(format!("unknown byte order '{other}'"))),
        }
    }

    /// Whether values in this order must be swapped to reach host order.
    pub fn needs_swap(&self) -> bool {
        *self != Self::native()
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reverse the bytes of every `width`-byte element of `buf` in place.
pub fn swap_in_place(buf: &mut [u8], width: usize) {
    if width <= 1 {
        return;
    }
    for chunk in buf.chunks_exact_mut(width) {
        chunk.reverse();
    }
}

/// Float encodings understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FloatFormat {
    #[default]
    Ieee,
    /// Legacy VAX F (4-byte) and D (8-byte) floats.
    Vax,
}

// ============================================================================
// VAX floats
// ============================================================================

/// Decode a VAX F-float. Reserved operands decode to NaN.
pub fn vax_f_to_f64(bytes: [u8; 4]) -> f64 {
    let w0 = u16::from_le_bytes([bytes[0], bytes[1]]) as u32;
    let w1 = u16::from_le_bytes([bytes[2], bytes[3]]) as u32;
    let negative = w0 & 0x8000 != 0;
    let exponent = ((w0 >> 7) & 0xFF) as i32;
    if exponent == 0 {
        return if negative { f64::NAN } else { 0.0 };
    }
    let fraction = ((w0 & 0x7F) << 16) | w1;
    let mantissa = (fraction | 0x80_0000) as f64 / (1u64 << 24) as f64;
    let value = mantissa * 2f64.powi(exponent - 128);
    if negative {
        -value
    } else {
        value
    }
}

/// Decode a VAX D-float. Reserved operands decode to NaN.
pub fn vax_d_to_f64(bytes: [u8; 8]) -> f64 {
    let word = |i: usize| u16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]) as u64;
    let w0 = word(0);
    let negative = w0 & 0x8000 != 0;
    let exponent = ((w0 >> 7) & 0xFF) as i32;
    if exponent == 0 {
        return if negative { f64::NAN } else { 0.0 };
    }
    let fraction = ((w0 & 0x7F) << 48) | (word(1) << 32) | (word(2) << 16) | word(3);
    let mantissa = (fraction | (1u64 << 55)) as f64 / (1u64 << 56) as f64;
    let value = mantissa * 2f64.powi(exponent - 128);
    if negative {
        -value
    } else {
        value
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Special sentinel bits of 32-bit Real storage, in class order
/// NULL, LRS, LIS, HIS, HRS.
const REAL_SPECIALS: [u32; 5] = [0xFF7F_FFFB, 0xFF7F_FFFC, 0xFF7F_FFFD, 0xFF7F_FFFE, 0xFF7F_FFFF];
/// Smallest valid 32-bit Real (`0xFF7FFFFA`).
const REAL_VALID_MIN: f64 = -3.4028224522648084e38;

fn class_index(class: SpecialPixel) -> usize {
    match class {
        SpecialPixel::Null => 0,
        SpecialPixel::Lrs => 1,
        SpecialPixel::Lis => 2,
        SpecialPixel::His => 3,
        SpecialPixel::Hrs => 4,
    }
}

/// Converts between raw stored pixels and canonical `f64` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelCodec {
    pub pixel_type: PixelType,
    pub byte_order: ByteOrder,
    pub base: f64,
    pub multiplier: f64,
    pub float_format: FloatFormat,
}

impl PixelCodec {
    pub fn new(pixel_type: PixelType, byte_order: ByteOrder) -> Self {
        Self {
            pixel_type,
            byte_order,
            base: 0.0,
            multiplier: 1.0,
            float_format: FloatFormat::Ieee,
        }
    }

    pub fn with_scaling(mut self, base: f64, multiplier: f64) -> Self {
        self.base = base;
        self.multiplier = multiplier;
        self
    }

    pub fn with_float_format(mut self, format: FloatFormat) -> Self {
        self.float_format = format;
        self
    }

    /// Bytes per pixel.
    pub fn width(&self) -> usize {
        self.pixel_type.size()
    }

    /// Read the raw numeric value of one pixel without special detection or
    /// scaling. `bytes` must hold at least [`PixelCodec::width`] bytes.
    pub fn read_raw(&self, bytes: &[u8]) -> f64 {
        let msb = self.byte_order == ByteOrder::Msb;
        match self.pixel_type {
            PixelType::UnsignedByte => bytes[0] as f64,
            PixelType::SignedWord => {
                let b = [bytes[0], bytes[1]];
                (if msb { i16::from_be_bytes(b) } else { i16::from_le_bytes(b) }) as f64
            }
            PixelType::UnsignedWord => {
                let b = [bytes[0], bytes[1]];
                (if msb { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) }) as f64
            }
            PixelType::SignedInteger => {
                let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
                (if msb { i32::from_be_bytes(b) } else { i32::from_le_bytes(b) }) as f64
            }
            PixelType::Real => {
                let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
                match self.float_format {
                    FloatFormat::Vax => vax_f_to_f64(b),
                    FloatFormat::Ieee => {
                        (if msb { f32::from_be_bytes(b) } else { f32::from_le_bytes(b) }) as f64
                    }
                }
            }
            PixelType::Double => {
                let mut b = [0u8; 8];
                b.copy_from_slice(&bytes[..8]);
                match self.float_format {
                    FloatFormat::Vax => vax_d_to_f64(b),
                    FloatFormat::Ieee => {
                        if msb {
                            f64::from_be_bytes(b)
                        } else {
                            f64::from_le_bytes(b)
                        }
                    }
                }
            }
        }
    }

    /// Decode one stored pixel into its canonical value.
    pub fn decode_one(&self, bytes: &[u8]) -> f64 {
        let msb = self.byte_order == ByteOrder::Msb;
        match self.pixel_type {
            PixelType::Real if self.float_format == FloatFormat::Ieee => {
                let b = [bytes[0], bytes[1], bytes[2], bytes[3]];
                let bits = if msb { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) };
                if let Some(i) = REAL_SPECIALS.iter().position(|s| *s == bits) {
                    return SpecialPixel::ALL[i].value();
                }
                let v = f32::from_bits(bits) as f64;
                if v.is_finite() {
                    v
                } else {
                    special::NULL
                }
            }
            PixelType::Real | PixelType::Double => {
                let v = self.read_raw(bytes);
                if v.is_finite() {
                    v
                } else {
                    special::NULL
                }
            }
            integer => {
                let raw = self.read_raw(bytes) as i64;
                for class in SpecialPixel::ALL {
                    if integer.special_code(class) == Some(raw) {
                        return class.value();
                    }
                }
                // Codes between the sentinels and the valid range are
                // reserved and carry no data.
                match integer.valid_range() {
                    Some((min, max)) if raw < min || raw > max => special::NULL,
                    _ => self.base + self.multiplier * raw as f64,
                }
            }
        }
    }

    /// Encode one canonical value into `out`. Out-of-range values saturate to
    /// LRS or HRS; integers are rounded to nearest.
    pub fn encode_one(&self, value: f64, out: &mut [u8]) {
        let msb = self.byte_order == ByteOrder::Msb;
        match self.pixel_type {
            PixelType::Double => {
                let b = if msb { value.to_be_bytes() } else { value.to_le_bytes() };
                out[..8].copy_from_slice(&b);
            }
            PixelType::Real => {
                let bits = match special::classify(value) {
                    Some(class) => REAL_SPECIALS[class_index(class)],
                    None if value < REAL_VALID_MIN => REAL_SPECIALS[class_index(SpecialPixel::Lrs)],
                    None if value > f32::MAX as f64 => REAL_SPECIALS[class_index(SpecialPixel::Hrs)],
                    None => (value as f32).to_bits(),
                };
                let b = if msb { bits.to_be_bytes() } else { bits.to_le_bytes() };
                out[..4].copy_from_slice(&b);
            }
            integer => {
                let raw = self.to_raw_integer(integer, value);
                match integer {
                    PixelType::UnsignedByte => out[0] = raw as u8,
                    PixelType::SignedWord => {
                        let v = raw as i16;
                        out[..2].copy_from_slice(&if msb { v.to_be_bytes() } else { v.to_le_bytes() });
                    }
                    PixelType::UnsignedWord => {
                        let v = raw as u16;
                        out[..2].copy_from_slice(&if msb { v.to_be_bytes() } else { v.to_le_bytes() });
                    }
                    _ => {
                        let v = raw as i32;
                        out[..4].copy_from_slice(&if msb { v.to_be_bytes() } else { v.to_le_bytes() });
                    }
                }
            }
        }
    }

    fn to_raw_integer(&self, integer: PixelType, value: f64) -> i64 {
        let code = |class| integer.special_code(class).unwrap_or(0);
        if let Some(class) = special::classify(value) {
            return code(class);
        }
        let (min, max) = integer.valid_range().unwrap_or((0, 0));
        let scaled = ((value - self.base) / self.multiplier).round();
        if !scaled.is_finite() {
            return code(SpecialPixel::Null);
        }
        if scaled < min as f64 {
            code(SpecialPixel::Lrs)
        } else if scaled > max as f64 {
            code(SpecialPixel::Hrs)
        } else {
            scaled as i64
        }
    }

    /// Decode `out.len()` pixels from `raw`.
    pub fn decode(&self, raw: &[u8], out: &mut [f64]) -> Result<()> {
        let width = self.width();
        if raw.len() < out.len() * width {
            return Err(CubeError::bad_argument(format!(
                "raw buffer of {} bytes cannot hold {} {} pixels",
                raw.len(),
                out.len(),
                self.pixel_type
            )));
        }
        for (value, bytes) in out.iter_mut().zip(raw.chunks_exact(width)) {
            *value = self.decode_one(bytes);
        }
        Ok(())
    }

    /// Encode `values` into `raw`.
    pub fn encode(&self, values: &[f64], raw: &mut [u8]) -> Result<()> {
        let width = self.width();
        if raw.len() < values.len() * width {
            return Err(CubeError::bad_argument(format!(
                "raw buffer of {} bytes cannot hold {} {} pixels",
                raw.len(),
                values.len(),
                self.pixel_type
            )));
        }
        for (value, bytes) in values.iter().zip(raw.chunks_exact_mut(width)) {
            self.encode_one(*value, bytes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::special::{classify, HRS, LRS, NULL};

    const ALL_TYPES: [PixelType; 6] = [
        PixelType::UnsignedByte,
        PixelType::SignedWord,
        PixelType::UnsignedWord,
        PixelType::SignedInteger,
        PixelType::Real,
        PixelType::Double,
    ];

    #[test]
    fn test_special_preservation_every_type_and_order() {
        for pixel_type in ALL_TYPES {
            for order in [ByteOrder::Lsb, ByteOrder::Msb] {
                let codec = PixelCodec::new(pixel_type, order);
                let values: Vec<f64> = SpecialPixel::ALL.iter().map(|c| c.value()).collect();
                let mut raw = vec![0u8; values.len() * codec.width()];
                codec.encode(&values, &mut raw).unwrap();
                let mut back = vec![0.0; values.len()];
                codec.decode(&raw, &mut back).unwrap();
                for (a, b) in values.iter().zip(&back) {
                    assert_eq!(a.to_bits(), b.to_bits(), "{pixel_type} {order}");
                }
                let mut again = vec![0u8; raw.len()];
                codec.encode(&back, &mut again).unwrap();
                assert_eq!(raw, again);
            }
        }
    }

    #[test]
    fn test_integer_saturation() {
        let codec = PixelCodec::new(PixelType::UnsignedByte, ByteOrder::Lsb);
        let mut raw = [0u8; 3];
        codec.encode(&[-5.0, 300.0, 17.4], &mut raw).unwrap();
        assert_eq!(raw, [1, 255, 17]);

        let mut back = [0.0; 3];
        codec.decode(&raw, &mut back).unwrap();
        assert_eq!(classify(back[0]), Some(SpecialPixel::Lrs));
        assert_eq!(classify(back[1]), Some(SpecialPixel::Hrs));
        assert_eq!(back[2], 17.0);
    }

    #[test]
    fn test_reserved_integer_codes_decode_as_null() {
        let unsigned = PixelCodec::new(PixelType::UnsignedWord, ByteOrder::Lsb);
        for code in [65523u16, 65528, 65533] {
            assert_eq!(unsigned.decode_one(&code.to_le_bytes()).to_bits(), NULL.to_bits(), "{code}");
        }
        assert_eq!(unsigned.decode_one(&65522u16.to_le_bytes()), 65522.0);
        assert_eq!(classify(unsigned.decode_one(&65534u16.to_le_bytes())), Some(SpecialPixel::His));

        let signed = PixelCodec::new(PixelType::SignedWord, ByteOrder::Msb);
        for code in [-32763i16, -32758, -32753] {
            assert_eq!(signed.decode_one(&code.to_be_bytes()).to_bits(), NULL.to_bits(), "{code}");
        }
        assert_eq!(signed.decode_one(&(-32752i16).to_be_bytes()), -32752.0);

        let long = PixelCodec::new(PixelType::SignedInteger, ByteOrder::Lsb);
        assert_eq!(long.decode_one(&(i32::MIN + 10).to_le_bytes()).to_bits(), NULL.to_bits());
        assert_eq!(long.decode_one(&(i32::MIN + 16).to_le_bytes()), (i32::MIN + 16) as f64);
    }

    #[test]
    fn test_scaling_applied_to_integers() {
        let codec = PixelCodec::new(PixelType::SignedWord, ByteOrder::Msb).with_scaling(100.0, 0.5);
        let mut raw = [0u8; 2];
        codec.encode(&[150.0], &mut raw).unwrap();
        assert_eq!(i16::from_be_bytes(raw), 100);
        assert_eq!(codec.decode_one(&raw), 150.0);
    }

    #[test]
    fn test_real_clamps_out_of_range() {
        let codec = PixelCodec::new(PixelType::Real, ByteOrder::Lsb);
        let mut raw = [0u8; 8];
        codec.encode(&[1e300, -1e300], &mut raw).unwrap();
        assert_eq!(codec.decode_one(&raw[..4]).to_bits(), HRS.to_bits());
        assert_eq!(codec.decode_one(&raw[4..]).to_bits(), LRS.to_bits());
        let nan = f32::NAN.to_le_bytes();
        assert_eq!(codec.decode_one(&nan).to_bits(), NULL.to_bits());
    }

    #[test]
    fn test_swap_in_place() {
        let mut buf = [1u8, 2, 3, 4, 5, 6, 7, 8];
        swap_in_place(&mut buf, 4);
        assert_eq!(buf, [4, 3, 2, 1, 8, 7, 6, 5]);
    }

    #[test]
    fn test_vax_floats() {
        // 1.0 as VAX F: exponent 129, fraction 0
        assert_eq!(vax_f_to_f64([0x80, 0x40, 0x00, 0x00]), 1.0);
        // -2.5: exponent 130, fraction 0.25 -> 0x2000 in the high word
        assert_eq!(vax_f_to_f64([0x20, 0xC1, 0x00, 0x00]), -2.5);
        assert_eq!(vax_f_to_f64([0, 0, 0, 0]), 0.0);
        assert_eq!(vax_d_to_f64([0x80, 0x40, 0, 0, 0, 0, 0, 0]), 1.0);

        let codec = PixelCodec::new(PixelType::Real, ByteOrder::Msb).with_float_format(FloatFormat::Vax);
        assert_eq!(codec.decode_one(&[0x80, 0x40, 0x00, 0x00]), 1.0);
    }

    #[test]
    fn test_pixel_type_names() {
        for t in ALL_TYPES {
            assert_eq!(PixelType::from_name(t.as_str()).unwrap(), t);
        }
        assert_eq!(PixelType::from_bitpix(-32).unwrap(), PixelType::Real);
        let err = PixelType::from_bitpix(64).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnsupportedPixelType);
    }
}
