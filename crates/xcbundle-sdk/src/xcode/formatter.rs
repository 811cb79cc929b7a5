//! Build log formatting with xcpretty.
//!
//! xcpretty is optional. If it is missing and cannot be installed the build
//! runs with raw xcodebuild output and a warning is logged.

use std::fmt;
use std::process::Command;
use std::str::FromStr;

use tracing::{info, warn};

use crate::builders::common::run_command;
use crate::types::BuildError;

/// How xcodebuild output is shown on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormatter {
    /// Raw xcodebuild output.
    #[default]
    Xcodebuild,
    /// xcodebuild output piped through `xcpretty`.
    Xcpretty,
}

impl FromStr for LogFormatter {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "xcodebuild" => Ok(LogFormatter::Xcodebuild),
            "xcpretty" => Ok(LogFormatter::Xcpretty),
            other => Err(BuildError::Config(format!(
                "unsupported log formatter {:?}, expected xcodebuild or xcpretty",
                other
            ))),
        }
    }
}

impl fmt::Display for LogFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormatter::Xcodebuild => f.write_str("xcodebuild"),
            LogFormatter::Xcpretty => f.write_str("xcpretty"),
        }
    }
}

/// The `xcpretty` gem.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xcpretty;

impl Xcpretty {
    /// Returns `true` if `xcpretty` can be executed.
    pub fn is_installed(&self) -> bool {
        Command::new("xcpretty")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Installs xcpretty with `gem install`.
    pub fn install(&self) -> Result<(), BuildError> {
        let mut cmd = Command::new("gem");
        cmd.args(["install", "xcpretty", "--no-document"]);
        run_command(cmd, "gem install xcpretty").map(|_| ())
    }

    /// Returns the installed xcpretty version.
    pub fn version(&self) -> Result<String, BuildError> {
        let mut cmd = Command::new("xcpretty");
        cmd.arg("--version");
        Ok(run_command(cmd, "xcpretty --version")?.trim().to_string())
    }

    fn ensure_installed(&self) -> Result<String, BuildError> {
        if !self.is_installed() {
            warn!("xcpretty is not installed");
            info!("Installing xcpretty");
            self.install()?;
        }
        self.version()
    }
}

/// Resolves the formatter the build will actually use.
///
/// Requesting xcpretty installs it when needed; any failure falls back to
/// [`LogFormatter::Xcodebuild`].
pub fn prepare_log_formatter(requested: LogFormatter) -> LogFormatter {
    if requested != LogFormatter::Xcpretty {
        return requested;
    }

    info!("Checking if output tool (xcpretty) is installed");
    match Xcpretty.ensure_installed() {
        Ok(version) => {
            info!("xcpretty version: {}", version);
            LogFormatter::Xcpretty
        }
        Err(e) => {
            warn!("{}", e);
            warn!("Switching to xcodebuild for output tool");
            LogFormatter::Xcodebuild
        }
    }
}
