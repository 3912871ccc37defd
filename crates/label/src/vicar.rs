//! VICAR label text.
//!
//! A label is a run of `KEY=VALUE` items separated by blanks and ended by
//! a NUL byte or the end of the text. Values are integers, reals, quoted
//! strings (`''` escapes a quote) or parenthesized lists. `PROPERTY='X'`
//! and `TASK='X'` start a group named `X` that collects the items after it.

use crate::tree::{Container, Keyword, Value};
use cube_common::{CubeError, Result};

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_blanks(&mut self) {
        while self.peek().map_or(false, char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: &str) -> CubeError {
        CubeError::parse(format!("VICAR label at byte {}: {}", self.pos, message))
    }

    fn key(&mut self) -> Result<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '=' {
                let key = self.text[start..self.pos].trim().to_string();
                self.bump();
                if key.is_empty() {
                    return Err(self.error("empty keyword name"));
                }
                return Ok(key);
            }
            if c.is_whitespace() {
                break;
            }
            self.bump();
        }
        Err(self.error("expected KEY=VALUE"))
    }

    fn quoted(&mut self) -> Result<Value> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\'') if self.peek() == Some('\'') => {
                    self.bump();
                    out.push('\'');
                }
                Some('\'') => return Ok(Value::quoted(out)),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn bare(&mut self, stop: &[char]) -> Value {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || stop.contains(&c) {
                break;
            }
            self.bump();
        }
        Value::new(&self.text[start..self.pos])
    }

    fn scalar(&mut self, stop: &[char]) -> Result<Value> {
        match self.peek() {
            Some('\'') => self.quoted(),
            Some(_) => Ok(self.bare(stop)),
            None => Err(self.error("missing value")),
        }
    }

    fn values(&mut self) -> Result<Vec<Value>> {
        self.skip_blanks();
        if self.peek() != Some('(') {
            return Ok(vec![self.scalar(&[])?]);
        }
        self.bump();
        let mut values = Vec::new();
        loop {
            self.skip_blanks();
            values.push(self.scalar(&[',', ')'])?);
            self.skip_blanks();
            match self.bump() {
                Some(',') => continue,
                Some(')') => return Ok(values),
                _ => return Err(self.error("unterminated list")),
            }
        }
    }
}

/// Parse VICAR label text into a tree. System items land at the root,
/// property and history items in their groups.
pub fn parse(text: &str) -> Result<Container> {
    let text = text.split('\0').next().unwrap_or("");
    let mut cursor = Cursor { text, pos: 0 };
    let mut root = Container::root();
    let mut current: Option<Container> = None;

    loop {
        cursor.skip_blanks();
        if cursor.peek().is_none() {
            break;
        }
        let key = cursor.key()?;
        let values = cursor.values()?;
        let is_section = key.eq_ignore_ascii_case("PROPERTY") || key.eq_ignore_ascii_case("TASK");
        if is_section {
            if let Some(done) = current.take() {
                root.add_group(done);
            }
            let name = values.first().map(|v| v.text.clone()).unwrap_or_default();
            let mut group = Container::new(name);
            group.add_keyword(Keyword::new(key.to_ascii_uppercase(), values[0].clone()));
            current = Some(group);
            continue;
        }
        let keyword = Keyword::array(key, values);
        match current.as_mut() {
            Some(group) => group.add_keyword(keyword),
            None => root.add_keyword(keyword),
        }
    }
    if let Some(done) = current {
        root.add_group(done);
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Traverse;

    #[test]
    fn test_system_and_property_items() {
        let text = "LBLSIZE=512  FORMAT='HALF'  NL=10  NS=20  \
                    PROPERTY='CASSINI-ISS'  MISSION_NAME='CASSINI-HUYGENS'  \
                    FILTER_NAME=('CL1','GRN')  EXPOSURE_DURATION=12.5  \
                    TASK='LABEL'  USER='O''NEIL'\0\0garbage";
        let root = parse(text).unwrap();
        assert_eq!(root.keyword_value("LBLSIZE", Traverse::CurrentLevel).unwrap(), "512");
        assert_eq!(root.keyword_value("FORMAT", Traverse::CurrentLevel).unwrap(), "HALF");

        let property = root.group("CASSINI-ISS", Traverse::CurrentLevel).unwrap();
        let filters = property.keyword("FILTER_NAME", Traverse::CurrentLevel).unwrap();
        assert_eq!((filters.value(0).unwrap(), filters.value(1).unwrap()), ("CL1", "GRN"));
        assert_eq!(
            root.keyword_value("MISSION_NAME", Traverse::DepthFirst).unwrap(),
            "CASSINI-HUYGENS"
        );
        let task = root.group("LABEL", Traverse::CurrentLevel).unwrap();
        assert_eq!(task.keyword_value("USER", Traverse::CurrentLevel).unwrap(), "O'NEIL");
    }

    #[test]
    fn test_malformed_items() {
        assert!(parse("LBLSIZE=512 DANGLING").is_err());
        assert!(parse("A='open").is_err());
        assert!(parse("A=(1,2").is_err());
        assert!(parse("").unwrap().is_empty());
    }
}
