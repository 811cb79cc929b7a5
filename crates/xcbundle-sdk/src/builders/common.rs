//! Common utilities shared by the xcodebuild-driving components.
//!
//! ## Error Messages
//!
//! Functions in this module return errors that say what went wrong, where
//! (paths, commands) and, where possible, how to fix it.

use std::path::Path;
use std::process::Command;

use crate::types::BuildError;

/// Validates that the project path points at an Xcode project or workspace.
///
/// # Arguments
/// * `project_path` - Path to a `.xcodeproj` or `.xcworkspace`
///
/// # Returns
/// `Ok(())` if validation passes, or a descriptive `BuildError` if it fails.
pub fn validate_project_path(project_path: &Path) -> Result<(), BuildError> {
    if !project_path.exists() {
        return Err(BuildError::Config(format!(
            "Project path does not exist: {}\n\n\
             Ensure you are running from the correct directory or set project_path.",
            project_path.display()
        )));
    }

    match project_path.extension().and_then(|e| e.to_str()) {
        Some("xcodeproj") | Some("xcworkspace") => Ok(()),
        _ => Err(BuildError::Config(format!(
            "Project path is not an Xcode project or workspace: {}\n\n\
             Expected a path ending in .xcodeproj or .xcworkspace.",
            project_path.display()
        ))),
    }
}

/// Returns `true` if the path is an `.xcworkspace`.
pub fn is_workspace(project_path: &Path) -> bool {
    project_path.extension().and_then(|e| e.to_str()) == Some("xcworkspace")
}

/// Runs an external command and returns its stdout.
///
/// Captures both stdout and stderr on failure and formats them into
/// an actionable error message.
///
/// # Arguments
/// * `cmd` - The command to execute
/// * `description` - Human-readable description of what the command does
pub fn run_command(mut cmd: Command, description: &str) -> Result<String, BuildError> {
    let output = cmd.output().map_err(|e| BuildError::Command {
        program: description.to_string(),
        source: e,
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(BuildError::MetadataRead(format!(
            "{} failed.\n\n\
             Exit status: {}\n\n\
             Stdout:\n{}\n\n\
             Stderr:\n{}",
            description, output.status, stdout, stderr
        )));
    }
    Ok(stdout)
}

/// Returns the last `n` lines of `text`, joined with newlines.
pub fn last_n_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Finds the value of a `KEY=value` build setting among xcodebuild options.
///
/// An empty value (`SYMROOT=`) counts as not set.
pub fn find_build_setting<'a>(options: &'a [String], key: &str) -> Option<&'a str> {
    let prefix = format!("{}=", key);
    options
        .iter()
        .find_map(|option| option.strip_prefix(&prefix))
        .filter(|value| !value.is_empty())
}

/// Finds the value following a flag such as `-derivedDataPath` among xcodebuild options.
pub fn find_option_value<'a>(options: &'a [String], flag: &str) -> Option<&'a str> {
    options
        .iter()
        .position(|option| option == flag)
        .and_then(|idx| options.get(idx + 1))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn build_setting_lookup() {
        assert_eq!(find_build_setting(&[], "SYMROOT"), None);
        assert_eq!(find_build_setting(&opts(&[""]), "SYMROOT"), None);
        assert_eq!(find_build_setting(&opts(&["SYMROOT="]), "SYMROOT"), None);
        assert_eq!(
            find_build_setting(&opts(&["-resultBundlePath", "tmp", "ARCHS=arm64"]), "SYMROOT"),
            None
        );
        assert_eq!(
            find_build_setting(
                &opts(&["-resultBundlePath", "tmp", "SYMROOT=tmp", "ARCHS=arm64"]),
                "SYMROOT"
            ),
            Some("tmp")
        );
    }

    #[test]
    fn option_value_lookup() {
        let options = opts(&["-derivedDataPath", "/tmp/dd", "-quiet"]);
        assert_eq!(find_option_value(&options, "-derivedDataPath"), Some("/tmp/dd"));
        assert_eq!(find_option_value(&options, "-quiet"), None);
        assert_eq!(find_option_value(&options, "-clonedSourcePackagesDirPath"), None);
    }

    #[test]
    fn last_lines() {
        assert_eq!(last_n_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(last_n_lines("a", 20), "a");
        assert_eq!(last_n_lines("", 5), "");
    }

    #[test]
    fn project_path_validation() {
        let dir = tempfile::TempDir::new().unwrap();
        let project = dir.path().join("App.xcodeproj");
        assert!(validate_project_path(&project).is_err());
        std::fs::create_dir(&project).unwrap();
        assert!(validate_project_path(&project).is_ok());
        assert!(validate_project_path(dir.path()).is_err());
        assert!(is_workspace(Path::new("App.xcworkspace")));
        assert!(!is_workspace(&project));
    }
}
