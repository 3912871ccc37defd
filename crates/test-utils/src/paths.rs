//! Locating mission data used by optional tests.

use std::path::PathBuf;

/// Returns the workspace root directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Finds a mission file (shape kernel, foreign image) by name.
///
/// `CUBEKIT_TEST_DATA` is searched first, then `testdata/` at the
/// workspace root.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let env_dir = std::env::var_os("CUBEKIT_TEST_DATA").map(PathBuf::from);
    env_dir
        .into_iter()
        .chain(std::iter::once(workspace_root().join("testdata")))
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}

/// Temporary directory for cubes written by a test, removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("cubekit_")
        .tempdir()
        .expect("create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_holds_manifest() {
        assert!(workspace_root().join("Cargo.toml").exists());
    }

    #[test]
    fn test_missing_file_is_none() {
        assert!(find_test_file("no_such_kernel_4f2a.plt").is_none());
    }

    #[test]
    fn test_temp_dir_prefix() {
        let dir = temp_test_dir();
        assert!(dir.path().to_string_lossy().contains("cubekit_"));
    }
}
