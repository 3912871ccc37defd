//! Verbatim preservation of a foreign label.

use cube_common::{CubeError, Result};
use label::{pvl, vicar, xml, Container, Keyword, Traverse};

/// Grammar of a preserved foreign label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelGrammar {
    Pvl,
    Xml,
    Fits,
    Vicar,
}

impl LabelGrammar {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pvl => "PVL",
            Self::Xml => "XML",
            Self::Fits => "FITS",
            Self::Vicar => "VICAR",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "PVL" => Ok(Self::Pvl),
            "XML" => Ok(Self::Xml),
            "FITS" => Ok(Self::Fits),
            "VICAR" => Ok(Self::Vicar),
            other => Err(CubeError::parse(format!("unknown original label grammar '{other}'"))),
        }
    }
}

/// The foreign header bytes, kept as found.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalLabel {
    pub grammar: LabelGrammar,
    pub bytes: Vec<u8>,
}

impl OriginalLabel {
    pub fn new(grammar: LabelGrammar, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            grammar,
            bytes: bytes.into(),
        }
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Parse the preserved bytes in their own grammar.
    pub fn parse(&self) -> Result<Container> {
        let text = self.text();
        match self.grammar {
            LabelGrammar::Pvl => pvl::parse(&text),
            LabelGrammar::Xml => xml::from_generic_xml(&text),
            LabelGrammar::Fits => Ok(parse_fits_cards(&text)),
            LabelGrammar::Vicar => vicar::parse(&text),
        }
    }

    /// Label object describing the blob.
    pub fn to_label_object(&self, start_byte: u64) -> Container {
        let mut object = Container::new("OriginalLabel");
        object.add_keyword(Keyword::new("Name", "IsisCube"));
        object.add_keyword(Keyword::new("StartByte", start_byte.to_string()));
        object.add_keyword(Keyword::new("Bytes", self.bytes.len().to_string()));
        object.add_keyword(Keyword::new("Format", self.grammar.as_str()));
        object
    }

    /// Blob location and grammar from the label object, as
    /// (start byte, byte count, grammar).
    pub fn describe(object: &Container) -> Result<(u64, usize, LabelGrammar)> {
        let start = object.keyword("StartByte", Traverse::CurrentLevel)?.as_i64(0)? as u64;
        let bytes = object.keyword("Bytes", Traverse::CurrentLevel)?.as_i64(0)? as usize;
        let grammar = match object.keyword_value("Format", Traverse::CurrentLevel) {
            Ok(f) => LabelGrammar::from_name(f)?,
            Err(_) => LabelGrammar::Pvl,
        };
        Ok((start, bytes, grammar))
    }
}

/// Turn 80-byte FITS header cards into keywords. `COMMENT`/`HISTORY`
/// cards and blank cards are kept as comments on the next keyword.
pub fn parse_fits_cards(text: &str) -> Container {
    let mut root = Container::root();
    let mut pending = Vec::new();
    let bytes = text.as_bytes();
    for card in bytes.chunks(80) {
        let card = String::from_utf8_lossy(card);
        let key = card.get(..8).unwrap_or(&card).trim().to_string();
        if key == "END" {
            break;
        }
        if key.is_empty() || key == "COMMENT" || key == "HISTORY" || card.get(8..10) != Some("= ") {
            let rest = card.get(8..).unwrap_or("").trim();
            if !rest.is_empty() {
                pending.push(rest.to_string());
            }
            continue;
        }
        let (value, _comment) = split_fits_value(card.get(10..).unwrap_or(""));
        let mut keyword = Keyword::new(key, value);
        keyword.comments = std::mem::take(&mut pending);
        root.add_keyword(keyword);
    }
    root
}

/// Split the value part of a card into (value, comment). Quoted strings
/// use doubled quotes as escapes.
pub fn split_fits_value(field: &str) -> (label::Value, Option<String>) {
    let trimmed = field.trim_start();
    if let Some(rest) = trimmed.strip_prefix('\'') {
        let mut value = String::new();
        let mut chars = rest.char_indices().peekable();
        let mut end = rest.len();
        while let Some((i, c)) = chars.next() {
            if c == '\'' {
                if let Some((_, '\'')) = chars.peek() {
                    value.push('\'');
                    chars.next();
                    continue;
                }
                end = i + 1;
                break;
            }
            value.push(c);
        }
        let comment = rest[end..].split_once('/').map(|(_, c)| c.trim().to_string());
        (label::Value::quoted(value.trim_end()), comment)
    } else {
        match trimmed.split_once('/') {
            Some((v, c)) => (label::Value::new(v.trim()), Some(c.trim().to_string())),
            None => (label::Value::new(trimmed.trim()), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(text: &str) -> String {
        format!("{text:<80}")
    }

    #[test]
    fn test_fits_cards() {
        let header = [
            card("SIMPLE  =                    T / conforms to FITS"),
            card("BITPIX  =                   16"),
            card("INSTRUME= 'ISS NAC '           / camera"),
            card("OBSERVER= 'O''Brien'"),
            card("COMMENT   calibrated later"),
            card("EXPTIME =                 1.25 / seconds"),
            card("END"),
        ]
        .concat();
        let root = parse_fits_cards(&header);
        assert_eq!(root.keyword_value("BITPIX", Traverse::CurrentLevel).unwrap(), "16");
        assert_eq!(root.keyword_value("INSTRUME", Traverse::CurrentLevel).unwrap(), "ISS NAC");
        assert_eq!(root.keyword_value("OBSERVER", Traverse::CurrentLevel).unwrap(), "O'Brien");
        let exptime = root.keyword("EXPTIME", Traverse::CurrentLevel).unwrap();
        assert_eq!(exptime.value(0).unwrap(), "1.25");
        assert_eq!(exptime.comments, vec!["calibrated later".to_string()]);
    }

    #[test]
    fn test_original_label_object() {
        let original = OriginalLabel::new(LabelGrammar::Pvl, "A = 1\nEND\n");
        let object = original.to_label_object(4097);
        let (start, bytes, grammar) = OriginalLabel::describe(&object).unwrap();
        assert_eq!((start, bytes, grammar), (4097, 10, LabelGrammar::Pvl));
        let parsed = original.parse().unwrap();
        assert_eq!(parsed.keyword_value("A", Traverse::CurrentLevel).unwrap(), "1");
    }
}
