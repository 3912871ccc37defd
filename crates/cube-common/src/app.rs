//! Declarative application parameter surface.
//!
//! Each application declares its parameters once; [`AppDefinition::parse`]
//! accepts `KEY=VALUE` arguments (keys are case-insensitive), fills
//! defaults, validates types and choices, and returns [`Parameters`] with
//! typed accessors by name.

use crate::error::{CubeError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Type of a parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    String,
    Integer,
    Double,
    Boolean,
    Filename,
    /// One of a fixed set of values (matched case-insensitively).
    Choice(Vec<String>),
}

/// One declared parameter.
#[derive(Debug, Clone)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParameterKind,
    pub default: Option<String>,
    pub required: bool,
    pub description: String,
}

impl ParameterDef {
    pub fn new(name: &str, kind: ParameterKind, description: &str) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            kind,
            default: None,
            required: false,
            description: description.to_string(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: &str) -> Self {
        self.default = Some(value.to_string());
        self
    }

    fn check(&self, value: &str) -> Result<String> {
        let bad = |what: &str| {
            CubeError::user(format!(
                "parameter {} = '{}' is not a valid {}",
                self.name, value, what
            ))
        };
        match &self.kind {
            ParameterKind::Integer => {
                value.parse::<i64>().map_err(|_| bad("integer"))?;
            }
            ParameterKind::Double => {
                value.parse::<f64>().map_err(|_| bad("number"))?;
            }
            ParameterKind::Boolean => {
                parse_bool(value).ok_or_else(|| bad("boolean"))?;
            }
            ParameterKind::Choice(options) => {
                return options
                    .iter()
                    .find(|o| o.eq_ignore_ascii_case(value))
                    .cloned()
                    .ok_or_else(|| bad(&format!("choice (one of {})", options.join(", "))));
            }
            ParameterKind::String | ParameterKind::Filename => {}
        }
        Ok(value.to_string())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "y" | "1" | "on" => Some(true),
        "no" | "false" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// An application's declared interface.
#[derive(Debug, Clone)]
pub struct AppDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDef>,
}

impl AppDefinition {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn param(mut self, def: ParameterDef) -> Self {
        self.parameters.push(def);
        self
    }

    /// Parse `KEY=VALUE` arguments against the declaration.
    pub fn parse<S: AsRef<str>>(&self, args: &[S]) -> Result<Parameters> {
        let mut entered = BTreeMap::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg.split_once('=').ok_or_else(|| {
                CubeError::user(format!("argument '{arg}' is not of the form KEY=VALUE"))
            })?;
            let key = key.trim().to_ascii_uppercase();
            let def = self
                .parameters
                .iter()
                .find(|p| p.name == key)
                .ok_or_else(|| CubeError::user(format!("{} has no parameter {}", self.name, key)))?;
            let value = def.check(value.trim().trim_matches('"'))?;
            entered.insert(key, value);
        }

        let mut values = BTreeMap::new();
        for def in &self.parameters {
            if let Some(v) = entered.get(&def.name) {
                values.insert(def.name.clone(), v.clone());
            } else if let Some(d) = &def.default {
                values.insert(def.name.clone(), d.clone());
            } else if def.required {
                return Err(CubeError::user(format!(
                    "parameter {} is required by {}",
                    def.name, self.name
                )));
            }
        }

        Ok(Parameters {
            app: self.name.clone(),
            values,
            entered: entered.into_keys().collect(),
        })
    }

    /// One line per parameter, for usage output.
    pub fn usage(&self) -> String {
        let mut out = format!("{}: {}\n", self.name, self.description);
        for p in &self.parameters {
            let default = p
                .default
                .as_deref()
                .map(|d| format!(" (default {d})"))
                .unwrap_or_default();
            let required = if p.required { " [required]" } else { "" };
            out.push_str(&format!("  {:<12} {}{}{}\n", p.name, p.description, default, required));
        }
        out
    }
}

/// Parsed parameter values with typed accessors.
#[derive(Debug, Clone)]
pub struct Parameters {
    app: String,
    values: BTreeMap<String, String>,
    entered: Vec<String>,
}

impl Parameters {
    fn raw(&self, name: &str) -> Result<&str> {
        let key = name.to_ascii_uppercase();
        self.values.get(&key).map(String::as_str).ok_or_else(|| {
            CubeError::not_found(format!("parameter {} has no value in {}", key, self.app))
        })
    }

    /// Whether the user entered the parameter explicitly.
    pub fn was_entered(&self, name: &str) -> bool {
        let key = name.to_ascii_uppercase();
        self.entered.iter().any(|k| *k == key)
    }

    pub fn has(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_ascii_uppercase())
    }

    pub fn string(&self, name: &str) -> Result<String> {
        self.raw(name).map(str::to_string)
    }

    pub fn integer(&self, name: &str) -> Result<i64> {
        let v = self.raw(name)?;
        v.parse()
            .map_err(|_| CubeError::user(format!("parameter {name} = '{v}' is not an integer")))
    }

    pub fn double(&self, name: &str) -> Result<f64> {
        let v = self.raw(name)?;
        v.parse()
            .map_err(|_| CubeError::user(format!("parameter {name} = '{v}' is not a number")))
    }

    pub fn boolean(&self, name: &str) -> Result<bool> {
        let v = self.raw(name)?;
        parse_bool(v).ok_or_else(|| CubeError::user(format!("parameter {name} = '{v}' is not a boolean")))
    }

    pub fn filename(&self, name: &str) -> Result<PathBuf> {
        self.raw(name).map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn flatfield() -> AppDefinition {
        AppDefinition::new("flatfield", "Divide a cube by a flat field")
            .param(ParameterDef::new("FROM", ParameterKind::Filename, "Input cube").required())
            .param(ParameterDef::new("TO", ParameterKind::Filename, "Output cube").required())
            .param(ParameterDef::new("EXPOSURE", ParameterKind::Double, "Exposure").default_value("1.0"))
            .param(
                ParameterDef::new(
                    "MODE",
                    ParameterKind::Choice(vec!["NULL".into(), "PATCH".into()]),
                    "Reseau policy",
                )
                .default_value("NULL"),
            )
    }

    #[test]
    fn test_parse_and_defaults() {
        let params = flatfield()
            .parse(&["from=in.cub", "TO=out.cub", "mode=patch"])
            .unwrap();
        assert_eq!(params.filename("FROM").unwrap(), PathBuf::from("in.cub"));
        assert_eq!(params.double("exposure").unwrap(), 1.0);
        assert_eq!(params.string("MODE").unwrap(), "PATCH");
        assert!(params.was_entered("to"));
        assert!(!params.was_entered("exposure"));
    }

    #[test]
    fn test_missing_required_is_user_error() {
        let err = flatfield().parse(&["FROM=in.cub"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::User);
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_type_validation() {
        let err = flatfield()
            .parse(&["FROM=a", "TO=b", "EXPOSURE=fast"])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::User);
        assert!(flatfield().parse(&["FROM=a", "TO=b", "BOGUS=1"]).is_err());
    }
}
