//! Enumeration of candidate xctestrun files under the products root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::BuildError;

/// File extension of test descriptors.
pub const XCTESTRUN_EXTENSION: &str = "xctestrun";

/// Lists the test descriptors a build may have produced.
///
/// Implementations return paths sorted by file name so that discovery order
/// is the same on every file system.
pub trait CandidateEnumerator {
    fn enumerate(&self, products_root: &Path, scheme: &str) -> Result<Vec<PathBuf>, BuildError>;
}

/// Every `*.xctestrun` entry directly inside the products root.
///
/// Makes no assumption about how xcodebuild names the files. A products
/// root that does not exist has no candidates; any other listing failure
/// is an I/O error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryListing;

impl CandidateEnumerator for DirectoryListing {
    fn enumerate(&self, products_root: &Path, _scheme: &str) -> Result<Vec<PathBuf>, BuildError> {
        let entries = match fs::read_dir(products_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(BuildError::Io(e)),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(XCTESTRUN_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }
}

/// Files matching `<products root>/<scheme>*.xctestrun`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobPattern;

impl GlobPattern {
    pub fn pattern(products_root: &Path, scheme: &str) -> String {
        format!(
            "{}/{}*.{}",
            glob::Pattern::escape(&products_root.to_string_lossy()),
            glob::Pattern::escape(scheme),
            XCTESTRUN_EXTENSION
        )
    }
}

impl CandidateEnumerator for GlobPattern {
    fn enumerate(&self, products_root: &Path, scheme: &str) -> Result<Vec<PathBuf>, BuildError> {
        let pattern = Self::pattern(products_root, scheme);
        let matches = glob::glob(&pattern).map_err(|e| BuildError::NoArtifactsFound {
            root: products_root.to_path_buf(),
            reason: format!("invalid search pattern {}: {}", pattern, e),
        })?;

        let mut paths = Vec::new();
        for entry in matches {
            let path = entry.map_err(|e| BuildError::Io(e.into_error()))?;
            paths.push(path);
        }
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn products_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in [
            "BullsEye_UnitTests_iphonesimulator15.5-arm64.xctestrun",
            "BullsEye_FullTests_iphonesimulator15.5-arm64.xctestrun",
            "Other_iphonesimulator15.5-arm64.xctestrun",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("Debug-iphonesimulator")).unwrap();
        fs::create_dir(dir.path().join("Nested.xctestrun")).unwrap();
        dir
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn directory_listing_is_sorted_and_extension_filtered() {
        let root = products_root();
        let paths = DirectoryListing.enumerate(root.path(), "BullsEye").unwrap();
        assert_eq!(
            names(&paths),
            vec![
                "BullsEye_FullTests_iphonesimulator15.5-arm64.xctestrun",
                "BullsEye_UnitTests_iphonesimulator15.5-arm64.xctestrun",
                "Other_iphonesimulator15.5-arm64.xctestrun",
            ]
        );
    }

    #[test]
    fn glob_pattern_requires_scheme_prefix() {
        let root = products_root();
        let paths = GlobPattern.enumerate(root.path(), "BullsEye").unwrap();
        assert_eq!(
            names(&paths),
            vec![
                "BullsEye_FullTests_iphonesimulator15.5-arm64.xctestrun",
                "BullsEye_UnitTests_iphonesimulator15.5-arm64.xctestrun",
            ]
        );
    }

    #[test]
    fn missing_root_has_no_candidates() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        assert!(DirectoryListing.enumerate(&missing, "App").unwrap().is_empty());
        assert!(GlobPattern.enumerate(&missing, "App").unwrap().is_empty());
    }

    #[test]
    fn unlistable_root_is_io_error() {
        let dir = TempDir::new().unwrap();
        let not_a_dir = dir.path().join("test_bundle");
        fs::write(&not_a_dir, "").unwrap();

        let result = DirectoryListing.enumerate(&not_a_dir, "App");
        assert!(matches!(result, Err(BuildError::Io(_))));
    }
}
