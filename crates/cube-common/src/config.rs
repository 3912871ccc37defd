//! Toolkit preferences.
//!
//! Preferences are an explicit value handed to sessions and importers.
//! [`Preferences::resolve`] follows the lookup order explicit file >
//! environment > bundled defaults and never touches process-global state.

use crate::error::{CubeError, Result, ResultExt};
use crate::pixel::PixelType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a preferences YAML file.
pub const PREFERENCES_ENV: &str = "CUBEKIT_PREFERENCES";

/// Toolkit-wide preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Root of mission data (calibration files, shape models).
    pub data_dir: Option<PathBuf>,

    /// Directory of label translation templates. `None` uses the bundled set.
    pub template_dir: Option<PathBuf>,

    /// Bytes reserved for the label at the start of attached cubes.
    pub label_bytes: usize,

    /// Edge length of square tiles used by tiled processing.
    pub tile_size: usize,

    /// Memory budget for the cube read cache in megabytes.
    pub cache_size_mb: usize,

    /// Number of tiles transformed together in tile-parallel mode.
    pub parallel_batch: usize,

    /// Pixel type of cubes created by importers.
    pub import_pixel_type: PixelType,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            data_dir: None,
            template_dir: None,
            label_bytes: 65536,
            tile_size: 128,
            cache_size_mb: 64,
            parallel_batch: 16,
            import_pixel_type: PixelType::Real,
        }
    }
}

impl Preferences {
    /// Defaults overlaid with `CUBEKIT_*` environment variables.
    pub fn from_env() -> Self {
        let mut prefs = Self::default();

        if let Ok(val) = std::env::var("CUBEKIT_DATA_DIR") {
            prefs.data_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("CUBEKIT_TEMPLATES") {
            prefs.template_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("CUBEKIT_LABEL_BYTES") {
            if let Ok(n) = val.parse() {
                prefs.label_bytes = n;
            }
        }

        if let Ok(val) = std::env::var("CUBEKIT_TILE_SIZE") {
            if let Ok(n) = val.parse() {
                prefs.tile_size = n;
            }
        }

        if let Ok(val) = std::env::var("CUBEKIT_CACHE_SIZE_MB") {
            if let Ok(n) = val.parse() {
                prefs.cache_size_mb = n;
            }
        }

        if let Ok(val) = std::env::var("CUBEKIT_PARALLEL_BATCH") {
            if let Ok(n) = val.parse() {
                prefs.parallel_batch = n;
            }
        }

        if let Ok(val) = std::env::var("CUBEKIT_IMPORT_PIXEL_TYPE") {
            if let Ok(t) = PixelType::from_name(&val) {
                prefs.import_pixel_type = t;
            }
        }

        prefs
    }

    /// Load preferences from a YAML file; missing keys take defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CubeError::io(path, e))?;
        let prefs: Self = serde_yaml::from_str(&text)
            .map_err(CubeError::from)
            .with_context(|| format!("reading preferences from {}", path.display()))?;
        prefs.validate().map_err(CubeError::user)?;
        Ok(prefs)
    }

    /// Resolve preferences: an explicit file wins, then the file named by
    /// `CUBEKIT_PREFERENCES`, then environment variables over defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            debug!(path = %path.display(), "loading explicit preferences");
            return Self::from_yaml_file(path);
        }
        if let Ok(path) = std::env::var(PREFERENCES_ENV) {
            debug!(path = %path, "loading preferences from environment");
            return Self::from_yaml_file(Path::new(&path));
        }
        let prefs = Self::from_env();
        prefs.validate().map_err(CubeError::user)?;
        Ok(prefs)
    }

    /// Validate the preferences.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.label_bytes < 1024 {
            return Err("label_bytes must be >= 1024".to_string());
        }

        if self.tile_size == 0 {
            return Err("tile_size must be > 0".to_string());
        }

        if self.parallel_batch == 0 {
            return Err("parallel_batch must be > 0".to_string());
        }

        Ok(())
    }

    /// Read-cache budget in bytes.
    pub fn cache_size_bytes(&self) -> usize {
        self.cache_size_mb.saturating_mul(1024 * 1024)
    }

    /// Locate an auxiliary data file. Paths that exist as given win;
    /// otherwise relative paths are looked up under `data_dir`.
    pub fn data_file(&self, path: &Path) -> PathBuf {
        if path.is_absolute() || path.exists() {
            return path.to_path_buf();
        }
        match &self.data_dir {
            Some(dir) if dir.join(path).exists() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_preferences() {
        let prefs = Preferences::default();
        assert_eq!(prefs.label_bytes, 65536);
        assert_eq!(prefs.tile_size, 128);
        assert_eq!(prefs.import_pixel_type, PixelType::Real);
        assert!(prefs.validate().is_ok());
        assert_eq!(prefs.cache_size_bytes(), 64 * 1024 * 1024);
    }

    #[test]
    fn test_validation() {
        let mut prefs = Preferences::default();
        prefs.tile_size = 0;
        assert!(prefs.validate().is_err());

        prefs = Preferences::default();
        prefs.label_bytes = 10;
        assert!(prefs.validate().is_err());
    }

    #[test]
    fn test_explicit_yaml_wins() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tile_size: 64\nimport_pixel_type: SignedWord").unwrap();

        let prefs = Preferences::resolve(Some(file.path())).unwrap();
        assert_eq!(prefs.tile_size, 64);
        assert_eq!(prefs.import_pixel_type, PixelType::SignedWord);
        assert_eq!(prefs.label_bytes, 65536);
    }

    #[test]
    fn test_data_files_fall_back_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("calibration")).unwrap();
        std::fs::write(dir.path().join("calibration/flat.cub"), b"").unwrap();
        let relative = Path::new("calibration/flat.cub");

        let prefs = Preferences::default();
        assert_eq!(prefs.data_file(relative), relative);

        let prefs = Preferences {
            data_dir: Some(dir.path().to_path_buf()),
            ..Preferences::default()
        };
        assert_eq!(prefs.data_file(relative), dir.path().join(relative));
        assert_eq!(prefs.data_file(Path::new("missing.cub")), Path::new("missing.cub"));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tile_size: [not, a, number]").unwrap();
        let err = Preferences::from_yaml_file(file.path()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }
}
