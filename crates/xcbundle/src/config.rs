//! Configuration file support for xcbundle.
//!
//! An optional `xcbundle.toml` holds the step inputs that rarely change
//! between runs, so CI only has to pass what differs per build.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. Current working directory (`./xcbundle.toml`)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! ## Precedence
//!
//! CLI flags and their environment variables win over the file, which wins
//! over the built-in defaults.
//!
//! ## Example Configuration
//!
//! ```toml
//! [build]
//! project_path = "BullsEye.xcworkspace"
//! scheme = "BullsEye"
//! destination = "generic/platform=iOS Simulator"
//! test_plan = "FullTests"
//! xcodebuild_options = "-quiet"
//! log_formatter = "xcpretty"
//!
//! [output]
//! output_dir = "build/deploy"
//!
//! [signing]
//! automatic_code_signing = "api-key"
//! api_key_id = "ABC123"
//! api_key_issuer_id = "00000000-0000-0000-0000-000000000000"
//! api_key_path = "AuthKey_ABC123.p8"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "xcbundle.toml";

/// Destination used when neither the CLI nor the file sets one.
pub const DEFAULT_DESTINATION: &str = "generic/platform=iOS Simulator";

/// Root configuration structure for `xcbundle.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XcbundleConfig {
    /// xcodebuild inputs.
    pub build: BuildConfig,

    /// Where logs and the zipped test bundle go.
    pub output: OutputConfig,

    /// Automatic code signing.
    pub signing: SigningConfig,
}

/// xcodebuild inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Path to the `.xcodeproj` or `.xcworkspace`, relative to the working directory.
    pub project_path: Option<PathBuf>,

    pub scheme: Option<String>,

    /// Build configuration; the scheme's default when unset.
    pub configuration: Option<String>,

    /// `-destination` specifier.
    pub destination: String,

    pub test_plan: Option<String>,

    /// Additional xcodebuild options as a single shell-quoted string.
    pub xcodebuild_options: Option<String>,

    /// Build settings overrides, written to a temporary `.xcconfig`.
    pub xcconfig_content: Option<String>,

    /// `xcpretty` or `xcodebuild`.
    pub log_formatter: String,

    /// `Target/Class[/method]` entries skipped through the test plan.
    pub skip_testing: Vec<String>,

    /// Retry once after clearing the Swift package cache when resolution fails.
    pub retry_on_invalid_package_cache: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project_path: None,
            scheme: None,
            configuration: None,
            destination: DEFAULT_DESTINATION.to_string(),
            test_plan: None,
            xcodebuild_options: None,
            xcconfig_content: None,
            log_formatter: "xcpretty".to_string(),
            skip_testing: Vec::new(),
            retry_on_invalid_package_cache: true,
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for the raw log and `testbundle.zip` (default: `build/xcbundle`).
    pub output_dir: Option<PathBuf>,
}

/// How code signing assets are prepared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AutomaticCodeSigning {
    /// Use the signing settings of the project.
    #[default]
    Off,
    /// App Store Connect API key.
    ApiKey,
}

/// Code signing configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub automatic_code_signing: AutomaticCodeSigning,
    pub api_key_id: Option<String>,
    pub api_key_issuer_id: Option<String>,
    pub api_key_path: Option<PathBuf>,
}

impl XcbundleConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: XcbundleConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration from the current directory
    /// or any parent directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&cwd)
    }

    /// Attempts to find and load configuration starting from `start_dir`.
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Generates a starter configuration file as a formatted TOML string.
    ///
    /// `project_path` and `scheme` are filled in when known, otherwise left
    /// as commented placeholders.
    pub fn generate_starter_toml(project_path: Option<&Path>, scheme: Option<&str>) -> String {
        let project_line = match project_path {
            Some(path) => format!("project_path = {}", toml_string(&path.display().to_string())),
            None => "# project_path = \"MyApp.xcworkspace\"".to_string(),
        };
        let scheme_line = match scheme {
            Some(scheme) => format!("scheme = {}", toml_string(scheme)),
            None => "# scheme = \"MyApp\"".to_string(),
        };

        format!(
            r#"# xcbundle configuration file
# CLI flags and their environment variables override these settings.

[build]
# Xcode project (.xcodeproj) or workspace (.xcworkspace)
{project_line}

# Scheme to build; it must be shared to be found
{scheme_line}

# Build configuration (default: the scheme's own)
# configuration = "Debug"

# xcodebuild -destination specifier
destination = "{destination}"

# Test plan to build (required by skip_testing)
# test_plan = "FullTests"

# Additional xcodebuild options, split with shell quoting rules
# xcodebuild_options = "-quiet"

# Build settings written to a temporary .xcconfig; cannot be combined with -xcconfig
# xcconfig_content = "COMPILER_INDEX_STORE_ENABLE = NO"

# Output tool: xcpretty or xcodebuild
log_formatter = "xcpretty"

# Tests to skip, as Target/Class or Target/Class/method
# skip_testing = ["BullsEyeUITests/BullsEyeUITests/testLaunch"]

# Retry once after clearing the Swift package cache when resolution fails
retry_on_invalid_package_cache = true

[output]
# Directory for raw-xcodebuild-output.log and testbundle.zip (default: build/xcbundle)
# output_dir = "build/xcbundle"

[signing]
# off or api-key
automatic_code_signing = "off"
# api_key_id = "ABC123"
# api_key_issuer_id = "00000000-0000-0000-0000-000000000000"
# api_key_path = "AuthKey_ABC123.p8"
"#,
            project_line = project_line,
            scheme_line = scheme_line,
            destination = DEFAULT_DESTINATION,
        )
    }
}

/// Quotes `value` as a TOML string, escaping quotes and backslashes.
fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<XcbundleConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Creates a resolver from an explicit file, or by discovery when `explicit` is `None`.
    pub fn new(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let config = XcbundleConfig::load_from_file(path)?;
            return Ok(Self {
                config: Some(config),
                config_path: Some(path.to_path_buf()),
            });
        }

        match XcbundleConfig::discover()? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    /// Returns the build section, or its defaults without a file.
    pub fn build(&self) -> BuildConfig {
        self.config
            .as_ref()
            .map(|c| c.build.clone())
            .unwrap_or_default()
    }

    /// Returns the signing section, or its defaults without a file.
    pub fn signing(&self) -> SigningConfig {
        self.config
            .as_ref()
            .map(|c| c.signing.clone())
            .unwrap_or_default()
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// The resolved value prefers CLI over config over `default`.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&XcbundleConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }
}
