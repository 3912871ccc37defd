//! Template lookup.
//!
//! Templates are resolved in the order explicit directory >
//! `CUBEKIT_TEMPLATES` (via [`Preferences::template_dir`]) > the bundled
//! set. Templates found in a directory replace bundled templates of the
//! same name; bundled templates not overridden stay available.

use crate::template::TranslationTemplate;
use cube_common::{CubeError, Preferences, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const BUNDLED: [(&str, &str); 4] = [
    ("fits", include_str!("../templates/fits.yaml")),
    ("pds3", include_str!("../templates/pds3.yaml")),
    ("pds4", include_str!("../templates/pds4.yaml")),
    ("vicar", include_str!("../templates/vicar.yaml")),
];

/// Where the non-bundled templates came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Explicit(PathBuf),
    Preferences(PathBuf),
    Bundled,
}

/// Registry of translation templates keyed by lowercase name.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    templates: BTreeMap<String, TranslationTemplate>,
    source: TemplateSource,
}

impl TemplateStore {
    /// The templates shipped with the crate.
    pub fn bundled() -> Result<Self> {
        let mut templates = BTreeMap::new();
        for (name, text) in BUNDLED {
            let template = TranslationTemplate::from_yaml(text)
                .map_err(|e| CubeError::configuration(format!("bundled template {name}: {e}")))?;
            templates.insert(name.to_string(), template);
        }
        Ok(Self {
            templates,
            source: TemplateSource::Bundled,
        })
    }

    /// Bundled templates overlaid with every `*.yaml`/`*.yml` under `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(CubeError::user(format!(
                "template directory [{}] does not exist",
                dir.display()
            )));
        }
        let mut store = Self::bundled()?;
        let mut loaded = 0;
        for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, dir = %dir.display(), "Skipping unreadable template entry");
                    continue;
                }
            };
            let path = entry.path();
            let is_yaml = matches!(
                path.extension().and_then(|s| s.to_str()),
                Some("yaml") | Some("yml")
            );
            if !entry.file_type().is_file() || !is_yaml {
                continue;
            }
            let template = TranslationTemplate::from_file(path)?;
            store.insert(template);
            loaded += 1;
        }
        info!(dir = %dir.display(), loaded, total = store.len(), "Loaded translation templates");
        store.source = TemplateSource::Explicit(dir.to_path_buf());
        Ok(store)
    }

    /// Resolve the store for a run.
    pub fn resolve(explicit: Option<&Path>, prefs: &Preferences) -> Result<Self> {
        if let Some(dir) = explicit {
            return Self::from_dir(dir);
        }
        if let Some(dir) = &prefs.template_dir {
            let mut store = Self::from_dir(dir)?;
            store.source = TemplateSource::Preferences(dir.clone());
            return Ok(store);
        }
        Self::bundled()
    }

    pub fn insert(&mut self, template: TranslationTemplate) {
        self.templates.insert(template.name.to_ascii_lowercase(), template);
    }

    pub fn get(&self, name: &str) -> Result<&TranslationTemplate> {
        self.templates
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| CubeError::not_found(format!("translation template {name} not found")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_templates_parse() {
        let store = TemplateStore::bundled().unwrap();
        assert_eq!(store.names().collect::<Vec<_>>(), ["fits", "pds3", "pds4", "vicar"]);
        assert_eq!(store.source(), &TemplateSource::Bundled);
        assert!(store.get("PDS3").is_ok());
        assert_eq!(
            store.get("isis2").unwrap_err().kind(),
            cube_common::ErrorKind::NotFound
        );
    }
}
