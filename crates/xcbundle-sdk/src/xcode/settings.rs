//! Build settings as reported by `xcodebuild -showBuildSettings`.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use tracing::info;

use crate::builders::common::{is_workspace, run_command};
use crate::types::BuildError;

/// Key/value build settings of one scheme and configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSettings {
    values: HashMap<String, String>,
}

impl BuildSettings {
    /// Returns the value of `key`, or `MetadataRead` if the setting is absent.
    pub fn get(&self, key: &str) -> Result<&str, BuildError> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| BuildError::MetadataRead(format!("build setting {} is not set", key)))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for BuildSettings {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Parses the output of `xcodebuild -showBuildSettings`.
///
/// Every `KEY = value` line contributes one setting. The value may itself
/// contain ` = `. Lines without a separator (section headers, blank lines)
/// are ignored and later duplicates win.
pub fn parse_show_build_settings(output: &str) -> BuildSettings {
    let mut values = HashMap::new();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(" = ") else {
            continue;
        };
        values.insert(key.trim().to_string(), value.trim().to_string());
    }
    BuildSettings { values }
}

/// Reads the build settings of a scheme.
pub trait BuildSettingsReader {
    fn show_build_settings(
        &self,
        project_path: &Path,
        scheme: &str,
        configuration: Option<&str>,
        action: &str,
        options: &[String],
    ) -> Result<BuildSettings, BuildError>;
}

impl<T: BuildSettingsReader + ?Sized> BuildSettingsReader for &T {
    fn show_build_settings(
        &self,
        project_path: &Path,
        scheme: &str,
        configuration: Option<&str>,
        action: &str,
        options: &[String],
    ) -> Result<BuildSettings, BuildError> {
        (**self).show_build_settings(project_path, scheme, configuration, action, options)
    }
}

/// [`BuildSettingsReader`] backed by the `xcodebuild` command line tool.
#[derive(Debug, Clone, Copy, Default)]
pub struct XcodebuildSettingsReader;

impl BuildSettingsReader for XcodebuildSettingsReader {
    fn show_build_settings(
        &self,
        project_path: &Path,
        scheme: &str,
        configuration: Option<&str>,
        action: &str,
        options: &[String],
    ) -> Result<BuildSettings, BuildError> {
        let mut cmd = Command::new("xcodebuild");
        cmd.arg("-showBuildSettings");
        if is_workspace(project_path) {
            cmd.arg("-workspace");
        } else {
            cmd.arg("-project");
        }
        cmd.arg(project_path).arg("-scheme").arg(scheme);
        if let Some(configuration) = configuration {
            cmd.arg("-configuration").arg(configuration);
        }
        cmd.arg(action).args(options);

        info!("$ {:?}", cmd);
        let output = run_command(cmd, "xcodebuild -showBuildSettings")?;
        let settings = parse_show_build_settings(&output);
        if settings.is_empty() {
            return Err(BuildError::MetadataRead(format!(
                "xcodebuild -showBuildSettings returned no settings for scheme {}",
                scheme
            )));
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "Command line invocation:
    /Applications/Xcode.app/Contents/Developer/usr/bin/xcodebuild -showBuildSettings

Build settings for action build-for-testing and target BullsEye:
    ACTION = build-for-testing
    CONFIGURATION = Debug
    SYMROOT = /tmp/test_bundle123
    OTHER_SWIFT_FLAGS = -D A = B
    CONFIGURATION = Release
";

    #[test]
    fn parses_key_value_lines() {
        let settings = parse_show_build_settings(OUTPUT);
        assert_eq!(settings.get("SYMROOT").unwrap(), "/tmp/test_bundle123");
        assert_eq!(settings.get("ACTION").unwrap(), "build-for-testing");
        assert!(settings.get("Build settings for action build-for-testing and target BullsEye:").is_err());
    }

    #[test]
    fn value_keeps_embedded_separator() {
        let settings = parse_show_build_settings(OUTPUT);
        assert_eq!(settings.get("OTHER_SWIFT_FLAGS").unwrap(), "-D A = B");
    }

    #[test]
    fn later_duplicates_win() {
        let settings = parse_show_build_settings(OUTPUT);
        assert_eq!(settings.get("CONFIGURATION").unwrap(), "Release");
    }

    #[test]
    fn missing_key_is_metadata_error() {
        let settings = parse_show_build_settings("");
        assert!(settings.is_empty());
        assert!(matches!(
            settings.get("SYMROOT"),
            Err(BuildError::MetadataRead(_))
        ));
        assert!(settings.get("SYMROOT").is_err());
    }
}
