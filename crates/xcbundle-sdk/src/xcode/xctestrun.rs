//! Post-build corrections of xctestrun files.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::types::BuildError;

const PRIVATE_TEST_ROOT: &str = "/private__TESTROOT__";
const TEST_ROOT: &str = "__TESTROOT__";

/// Replaces every `/private__TESTROOT__` with `__TESTROOT__`.
///
/// Setting a custom SYMROOT under `/private/var` makes xcodebuild leak the
/// absolute prefix into the test root placeholders. Applying the
/// substitution more than once has no further effect.
pub fn fix_test_root(content: &str) -> String {
    content.replace(PRIVATE_TEST_ROOT, TEST_ROOT)
}

/// Applies [`fix_test_root`] to an xctestrun file in place.
///
/// Returns `true` if the file was rewritten.
pub fn fix_test_root_in_file(path: &Path) -> Result<bool, BuildError> {
    let content = fs::read_to_string(path)?;
    let fixed = fix_test_root(&content);
    if fixed == content {
        return Ok(false);
    }

    debug!("Fixing test root placeholders in {:?}", path);
    fs::write(path, fixed)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const XCTESTRUN: &str = r#"<key>TestHostPath</key>
<string>/private__TESTROOT__/Debug-iphonesimulator/BullsEye.app</string>
<key>DependentProductPaths</key>
<array>
    <string>__TESTROOT__/Debug-iphonesimulator/BullsEye.app</string>
</array>"#;

    #[test]
    fn replaces_private_prefix() {
        let fixed = fix_test_root(XCTESTRUN);
        assert!(!fixed.contains("/private__TESTROOT__"));
        assert_eq!(fixed.matches("__TESTROOT__/Debug-iphonesimulator").count(), 2);
    }

    #[test]
    fn substitution_is_idempotent() {
        let once = fix_test_root(XCTESTRUN);
        assert_eq!(fix_test_root(&once), once);
    }

    #[test]
    fn rewrites_file_only_when_needed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("BullsEye_iphonesimulator15.5-arm64.xctestrun");
        fs::write(&path, XCTESTRUN).unwrap();

        assert!(fix_test_root_in_file(&path).unwrap());
        assert!(!fix_test_root_in_file(&path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), fix_test_root(XCTESTRUN));
    }
}
