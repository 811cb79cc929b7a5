//! Installed Xcode version.

use std::process::Command;

use crate::builders::common::run_command;
use crate::types::BuildError;

/// Version reported by `xcodebuild -version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XcodeVersion {
    /// e.g. `Xcode 15.2`
    pub version: String,
    /// e.g. `15C500b`
    pub build_version: String,
    pub major: u32,
}

impl XcodeVersion {
    /// Runs `xcodebuild -version` and parses its output.
    pub fn detect() -> Result<Self, BuildError> {
        let mut cmd = Command::new("xcodebuild");
        cmd.arg("-version");
        let output = run_command(cmd, "xcodebuild -version")?;
        parse_xcode_version(&output)
    }
}

/// Parses
///
/// ```text
/// Xcode 15.2
/// Build version 15C500b
/// ```
pub fn parse_xcode_version(output: &str) -> Result<XcodeVersion, BuildError> {
    let mut version = None;
    let mut build_version = String::new();

    for line in output.lines().map(str::trim) {
        if line.starts_with("Xcode ") {
            version = Some(line.to_string());
        } else if let Some(build) = line.strip_prefix("Build version ") {
            build_version = build.trim().to_string();
        }
    }

    let version = version.ok_or_else(|| {
        BuildError::MetadataRead(format!("unexpected xcodebuild -version output: {}", output))
    })?;
    let major = version
        .trim_start_matches("Xcode ")
        .split('.')
        .next()
        .and_then(|major| major.trim().parse::<u32>().ok())
        .ok_or_else(|| {
            BuildError::MetadataRead(format!("failed to parse Xcode major version from {}", version))
        })?;

    Ok(XcodeVersion {
        version,
        build_version,
        major,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_version_output() {
        let version = parse_xcode_version("Xcode 15.2\nBuild version 15C500b\n").unwrap();
        assert_eq!(version.version, "Xcode 15.2");
        assert_eq!(version.build_version, "15C500b");
        assert_eq!(version.major, 15);
    }

    #[test]
    fn major_only_version() {
        let version = parse_xcode_version("Xcode 11\nBuild version 11A420a").unwrap();
        assert_eq!(version.major, 11);
    }

    #[test]
    fn rejects_unexpected_output() {
        assert!(parse_xcode_version("xcode-select: error").is_err());
        assert!(parse_xcode_version("Xcode beta\nBuild version 1").is_err());
    }
}
