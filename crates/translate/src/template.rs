//! Translation templates.
//!
//! A template names the output groups to build and, for each output
//! keyword, where to find the input keyword and how to map its values.
//!
//! ```yaml
//! name: pds3
//! groups:
//!   - name: Instrument
//!     keywords:
//!       - output: SpacecraftName
//!         input_key: SPACECRAFT_NAME
//!         translation:
//!           - ["Cassini-Huygens", "CASSINI*"]
//!           - ["*", "*"]
//! ```

use cube_common::{CubeError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A complete translation template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationTemplate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub groups: Vec<GroupRule>,
}

/// One output group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRule {
    pub name: String,
    pub keywords: Vec<KeywordRule>,
}

/// How one output keyword is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Output keyword name.
    pub output: String,

    /// Input keyword name (case-insensitive).
    pub input_key: String,

    /// Alternative container paths from the label root, tried in order.
    /// An empty path is the root itself. When absent the whole label is
    /// searched depth-first.
    #[serde(default)]
    pub input_position: Option<Vec<Vec<String>>>,

    /// Only translate this 0-based value of the input keyword.
    #[serde(default)]
    pub value_index: Option<usize>,

    /// Used when the input keyword is missing.
    #[serde(default)]
    pub default: Option<String>,

    /// `(output, input)` pairs. `*` in an input pattern matches any run of
    /// characters; an output of `*` copies the input value.
    #[serde(default)]
    pub translation: Vec<(String, String)>,

    /// Unit attached to every output value.
    #[serde(default)]
    pub unit: Option<String>,

    /// Fail instead of skipping when the input and default are missing.
    #[serde(default)]
    pub required: bool,
}

impl TranslationTemplate {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let template: Self = serde_yaml::from_str(text).map_err(CubeError::from)?;
        template.validate()?;
        Ok(template)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CubeError::io(path, e))?;
        Self::from_yaml(&text).with_context(|| format!("loading template {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CubeError::user("translation template has no name"));
        }
        for group in &self.groups {
            if group.name.trim().is_empty() {
                return Err(CubeError::user(format!("template {} has an unnamed group", self.name)));
            }
            for rule in &group.keywords {
                if rule.output.trim().is_empty() || rule.input_key.trim().is_empty() {
                    return Err(CubeError::user(format!(
                        "template {} group {} has a rule without output or input key",
                        self.name, group.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl KeywordRule {
    /// Map one input value through the translation table.
    pub fn translate_value(&self, input: &str) -> Result<String> {
        if self.translation.is_empty() {
            return Ok(input.to_string());
        }
        let input = input.trim();
        for (output, pattern) in &self.translation {
            if wildcard_match(pattern, input) {
                return Ok(if output == "*" { input.to_string() } else { output.clone() });
            }
        }
        Err(CubeError::user(format!(
            "cannot translate value [{}] of keyword {} into {}",
            input, self.input_key, self.output
        )))
    }
}

/// Case-insensitive match where `*` stands for any run of characters.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.trim().to_ascii_uppercase();
    let text = text.to_ascii_uppercase();
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }

    let mut rest = text.as_str();
    let first = parts[0];
    if !rest.starts_with(first) {
        return false;
    }
    rest = &rest[first.len()..];
    let last = parts[parts.len() - 1];
    for middle in &parts[1..parts.len() - 1] {
        match rest.find(middle) {
            Some(i) => rest = &rest[i + middle.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
