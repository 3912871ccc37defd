//! FITS header units.
//!
//! Every HDU is a run of 2880-byte blocks of 80-byte cards ending with an
//! `END` card, followed by its data area padded to 2880 bytes.

use cube_common::{ByteOrder, CubeError, PixelType, Result, SpecialPixel, SpecialRanges};
use cube_store::original::parse_fits_cards;
use cube_store::{Dimensions, LabelGrammar, OriginalLabel};
use label::{Container, Traverse};

use crate::detect::ForeignFormat;
use crate::foreign::{
    checked_product, optional_count, optional_f64, required_count, required_int, DataLocation, ForeignImage,
};
use crate::layout::ImportLayout;

pub const BLOCK: usize = 2880;
const CARD: usize = 80;
const MAX_AXES: usize = 999;
const BITPIX_VALUES: [i64; 6] = [8, 16, 32, 64, -32, -64];

/// One header/data unit.
#[derive(Debug, Clone)]
pub struct Hdu {
    pub index: usize,
    pub cards: Container,
    /// Header bytes through the `END` card.
    pub header: Vec<u8>,
    pub data_offset: usize,
    pub data_bytes: usize,
}

impl Hdu {
    pub fn naxis(&self) -> Result<i64> {
        required_int(&self.cards, "NAXIS")
    }

    pub fn is_image(&self) -> bool {
        match self.cards.keyword_value("XTENSION", Traverse::CurrentLevel) {
            Ok(kind) => kind.trim().eq_ignore_ascii_case("IMAGE"),
            Err(_) => self.index == 0,
        }
    }
}

fn find_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut at = start;
    while at + CARD <= bytes.len() {
        let card = &bytes[at..at + CARD];
        if card.starts_with(b"END") && card[3..].iter().all(|b| *b == b' ') {
            return Some(at + CARD);
        }
        at += CARD;
    }
    None
}

fn padded(len: usize) -> usize {
    len.div_ceil(BLOCK) * BLOCK
}

/// Bytes in the data area of an HDU described by `cards`.
fn data_bytes(cards: &Container, index: usize) -> Result<usize> {
    let naxis = required_count(cards, "NAXIS")?;
    if naxis == 0 {
        return Ok(0);
    }
    if naxis > MAX_AXES {
        return Err(CubeError::parse(format!("NAXIS = {naxis} exceeds {MAX_AXES}")));
    }
    let bitpix = required_int(cards, "BITPIX")?;
    if !BITPIX_VALUES.contains(&bitpix) {
        return Err(CubeError::parse(format!("BITPIX = {bitpix} is not a FITS pixel width")));
    }
    let mut factors = Vec::with_capacity(naxis + 1);
    for axis in 1..=naxis {
        factors.push(required_count(cards, &format!("NAXIS{axis}"))?);
    }
    let what = format!("FITS HDU {index} data size");
    let elements = checked_product(&factors, &what)?
        .checked_add(optional_count(cards, "PCOUNT", 0)?)
        .ok_or_else(|| CubeError::parse(format!("{what} overflows")))?;
    let width = bitpix.unsigned_abs() as usize / 8;
    checked_product(&[width, optional_count(cards, "GCOUNT", 1)?, elements], &what)
}

/// Split a FITS file into its HDUs.
pub fn read_hdus(bytes: &[u8]) -> Result<Vec<Hdu>> {
    let mut hdus = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let Some(end) = find_end(bytes, offset) else {
            if hdus.is_empty() {
                return Err(CubeError::parse("FITS header has no END card"));
            }
            break;
        };
        let header = bytes[offset..end].to_vec();
        let cards = parse_fits_cards(&String::from_utf8_lossy(&header));
        let data_offset = offset + padded(end - offset);

        let data_bytes = data_bytes(&cards, hdus.len())?;

        tracing::debug!(hdu = hdus.len(), header_bytes = header.len(), data_bytes, "Read FITS HDU");
        hdus.push(Hdu {
            index: hdus.len(),
            cards,
            header,
            data_offset,
            data_bytes,
        });
        offset = match data_bytes.div_ceil(BLOCK).checked_mul(BLOCK).and_then(|n| n.checked_add(data_offset)) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(hdus)
}

/// Choose the HDU to import: the explicit one, the primary when it has
/// data, or the first image extension.
pub fn select_hdu(hdus: &[Hdu], explicit: Option<usize>) -> Result<&Hdu> {
    if let Some(index) = explicit {
        let hdu = hdus
            .get(index)
            .ok_or_else(|| CubeError::user(format!("FITS file has no HDU {index} ({} present)", hdus.len())))?;
        if !hdu.is_image() || hdu.naxis()? == 0 {
            return Err(CubeError::user(format!("FITS HDU {index} holds no image")));
        }
        return Ok(hdu);
    }
    for hdu in hdus {
        if hdu.is_image() && hdu.naxis()? > 0 {
            return Ok(hdu);
        }
    }
    Err(CubeError::user("FITS file holds no image HDU"))
}

/// Describe the image of a FITS file.
pub fn read_header(bytes: &[u8], hdu: Option<usize>) -> Result<ForeignImage> {
    let hdus = read_hdus(bytes)?;
    let chosen = select_hdu(&hdus, hdu)?;
    let cards = &chosen.cards;

    let naxis = chosen.naxis()?;
    if naxis > 3 {
        return Err(CubeError::user(format!("FITS images with {naxis} axes are not supported")));
    }
    let axis = |n: i64| -> Result<usize> {
        if n > naxis {
            Ok(1)
        } else {
            required_count(cards, &format!("NAXIS{n}"))
        }
    };
    let dimensions = Dimensions::new(axis(1)?, axis(2)?, axis(3)?);
    let pixel_type = PixelType::from_bitpix(required_int(cards, "BITPIX")?)?;

    let base = optional_f64(cards, "BZERO")?.unwrap_or(0.0);
    let multiplier = optional_f64(cards, "BSCALE")?.unwrap_or(1.0);
    let mut specials = SpecialRanges::new();
    if let Some(blank) = optional_f64(cards, "BLANK")? {
        specials = specials.with(SpecialPixel::Null, blank, blank);
    }

    let layout = ImportLayout::new(dimensions, pixel_type, ByteOrder::Msb)
        .with_file_header(chosen.data_offset as u64)
        .with_scaling(base, multiplier)
        .with_specials(specials);

    // Extension keywords override the primary header for translation.
    let mut label = hdus[0].cards.clone();
    if chosen.index != 0 {
        label.merge_from(cards);
    }

    Ok(ForeignImage {
        format: ForeignFormat::Fits,
        layout,
        data: DataLocation::Attached,
        original: OriginalLabel::new(LabelGrammar::Fits, chosen.header.clone()),
        label,
    })
}
