//! Foreign format identification.

use std::io::Read;
use std::path::Path;

use bytes::Bytes;
use cube_common::{CubeError, Result};

/// Foreign formats the importers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignFormat {
    Fits,
    Pds3,
    Pds4,
    Vicar,
    Ddd,
    /// Headerless pixels described entirely by the caller.
    Raw,
}

impl ForeignFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fits => "FITS",
            Self::Pds3 => "PDS3",
            Self::Pds4 => "PDS4",
            Self::Vicar => "VICAR",
            Self::Ddd => "DDD",
            Self::Raw => "RAW",
        }
    }

    /// Name of the bundled translation template for this format.
    pub fn template_name(&self) -> Option<&'static str> {
        match self {
            Self::Fits => Some("fits"),
            Self::Pds3 => Some("pds3"),
            Self::Pds4 => Some("pds4"),
            Self::Vicar => Some("vicar"),
            Self::Ddd | Self::Raw => None,
        }
    }
}

impl std::fmt::Display for ForeignFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DDD magic number, stored big-endian in the first word.
pub const DDD_MAGIC: u32 = 1659;

/// Identify a format from its leading bytes, falling back to the file
/// extension. Returns `None` when neither is recognized.
pub fn detect_format(bytes: &[u8], path: &Path) -> Option<ForeignFormat> {
    let head = &bytes[..bytes.len().min(4096)];
    if head.starts_with(b"SIMPLE  =") {
        return Some(ForeignFormat::Fits);
    }
    if head.starts_with(b"LBLSIZE=") {
        return Some(ForeignFormat::Vicar);
    }
    if head.len() >= 4 && u32::from_be_bytes([head[0], head[1], head[2], head[3]]) == DDD_MAGIC {
        return Some(ForeignFormat::Ddd);
    }
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start();
    if trimmed.starts_with("PDS_VERSION_ID") || trimmed.starts_with("CCSD3ZF") || trimmed.starts_with("ODL_VERSION_ID") {
        return Some(ForeignFormat::Pds3);
    }
    if trimmed.starts_with("<?xml") && text.contains("Product_") {
        return Some(ForeignFormat::Pds4);
    }
    detect_from_extension(path)
}

fn detect_from_extension(path: &Path) -> Option<ForeignFormat> {
    let lower = path.to_string_lossy().to_lowercase();
    let lower = lower.strip_suffix(".gz").unwrap_or(&lower);
    if lower.ends_with(".fits") || lower.ends_with(".fit") || lower.ends_with(".fts") {
        Some(ForeignFormat::Fits)
    } else if lower.ends_with(".lbl") || lower.ends_with(".img") || lower.ends_with(".qub") {
        Some(ForeignFormat::Pds3)
    } else if lower.ends_with(".xml") {
        Some(ForeignFormat::Pds4)
    } else if lower.ends_with(".vic") || lower.ends_with(".vicar") {
        Some(ForeignFormat::Vicar)
    } else if lower.ends_with(".ddd") {
        Some(ForeignFormat::Ddd)
    } else {
        None
    }
}

/// Whether a path names a gzip-compressed file.
pub fn is_gzip(path: &Path, bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x1f, 0x8b])
        || path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("gz"))
}

/// Inflate a gzip stream.
pub fn decompress_gzip(data: &[u8]) -> Result<Bytes> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| CubeError::parse(format!("gzip decompression failed: {e}")))?;
    Ok(Bytes::from(decompressed))
}

/// Read a whole input file, inflating it when compressed.
pub fn read_input(path: &Path) -> Result<Bytes> {
    let raw = std::fs::read(path).map_err(|e| CubeError::io(path, e))?;
    if is_gzip(path, &raw) {
        tracing::debug!(file = %path.display(), compressed = raw.len(), "Inflating gzip input");
        decompress_gzip(&raw)
    } else {
        Ok(Bytes::from(raw))
    }
}
