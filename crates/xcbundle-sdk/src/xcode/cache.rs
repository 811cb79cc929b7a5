//! Location of the Swift package dependency cache.
//!
//! When the cached checkouts get corrupted xcodebuild fails with
//! [`SWIFT_PACKAGES_STATE_INVALID`] in its output. The build executor then
//! removes the directory returned by [`swift_packages_path`] and retries once.

use std::path::{Path, PathBuf};

use crate::builders::common::find_option_value;

/// Literal xcodebuild prints when the package cache is in an invalid state.
pub const SWIFT_PACKAGES_STATE_INVALID: &str = "Could not resolve package dependencies:";

const CLONED_SOURCE_PACKAGES_DIR: &str = "-clonedSourcePackagesDirPath";
const DERIVED_DATA_PATH: &str = "-derivedDataPath";

/// Resolves the Swift packages cache directory of a build.
///
/// In order of precedence:
/// 1. `-clonedSourcePackagesDirPath <dir>` in the options
/// 2. `-derivedDataPath <dir>` in the options, `<dir>/SourcePackages`
/// 3. the project's DerivedData folder derived from its `BUILD_DIR`
///    (`.../DerivedData/<project>-<hash>/Build/Products`)
pub fn swift_packages_path(options: &[String], build_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = find_option_value(options, CLONED_SOURCE_PACKAGES_DIR) {
        return Some(PathBuf::from(dir));
    }
    if let Some(dir) = find_option_value(options, DERIVED_DATA_PATH) {
        return Some(Path::new(dir).join("SourcePackages"));
    }

    build_dir?
        .ancestors()
        .find(|dir| {
            dir.parent()
                .and_then(|parent| parent.file_name())
                .is_some_and(|name| name == "DerivedData")
        })
        .map(|project_dir| project_dir.join("SourcePackages"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cloned_source_packages_dir_wins() {
        let options = opts(&[
            "-derivedDataPath",
            "/tmp/dd",
            "-clonedSourcePackagesDirPath",
            "/tmp/spm",
        ]);
        assert_eq!(
            swift_packages_path(&options, None),
            Some(PathBuf::from("/tmp/spm"))
        );
    }

    #[test]
    fn derived_data_path_option() {
        let options = opts(&["-derivedDataPath", "/tmp/dd"]);
        assert_eq!(
            swift_packages_path(&options, Some(Path::new("/ignored/DerivedData/A/Build/Products"))),
            Some(PathBuf::from("/tmp/dd/SourcePackages"))
        );
    }

    #[test]
    fn derived_from_build_dir() {
        let build_dir = Path::new(
            "/Users/vagrant/Library/Developer/Xcode/DerivedData/BullsEye-abcdef/Build/Products",
        );
        assert_eq!(
            swift_packages_path(&[], Some(build_dir)),
            Some(PathBuf::from(
                "/Users/vagrant/Library/Developer/Xcode/DerivedData/BullsEye-abcdef/SourcePackages"
            ))
        );
    }

    #[test]
    fn unknown_layout_has_no_cache() {
        assert_eq!(swift_packages_path(&[], Some(Path::new("/tmp/build/Products"))), None);
        assert_eq!(swift_packages_path(&[], None), None);
    }
}
