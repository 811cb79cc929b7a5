//! # xcbundle
//!
//! CI step that builds an Xcode scheme for testing and packages the result
//! so tests can run later, on another machine or device farm, with
//! `xcodebuild test-without-building`.
//!
//! ## Overview
//!
//! `xcbundle build`:
//!
//! - **Builds** - Runs `xcodebuild build-for-testing` into a fresh products
//!   root, retrying once when the Swift package cache is corrupted
//! - **Locates** - Finds the `.xctestrun` files generated by that build and
//!   the built products directory they reference
//! - **Exports** - Saves the raw log, zips the test bundle and exports the
//!   paths for later CI steps
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a starter configuration
//! xcbundle init --project-path BullsEye.xcworkspace --scheme BullsEye
//!
//! # Build for testing
//! xcbundle build --test-plan FullTests --log-formatter xcpretty
//! ```
//!
//! Every `build` flag also reads an environment variable of the same name
//! in snake case (`project_path`, `scheme`, `xcodebuild_options`, ...), so
//! the binary runs as a CI step without arguments.
//!
//! ## Exported Outputs
//!
//! | Key | Value |
//! |-----|-------|
//! | `BITRISE_XCODE_RAW_RESULT_TEXT_PATH` | Raw xcodebuild output |
//! | `BITRISE_TEST_BUNDLE_PATH` | Products root of the build |
//! | `BITRISE_TEST_BUNDLE_ZIP_PATH` | Zipped built products and xctestrun files |
//! | `BITRISE_XCTESTRUN_FILE_PATH` | xctestrun file of the default test plan |
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `xcbundle.toml`
//! - [`export`] - Output export to `envman` or stdout

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use xcbundle_sdk::builders::{find_option_value, last_n_lines};
use xcbundle_sdk::runner::LOG_TAIL_LINES;
use xcbundle_sdk::xcode::prepare_log_formatter;
use xcbundle_sdk::{
    ApiKeySigning, BuildError, BuildInvocation, LogFormatter, SigningDisabled, TestBundleBuilder,
    XcodeVersion,
};

use config::{AutomaticCodeSigning, CONFIG_FILE_NAME, ConfigResolver, XcbundleConfig};
use export::{Exporter, default_sink};

pub mod config;
pub mod export;

/// Default output directory when neither the CLI nor the config sets one.
pub const DEFAULT_OUTPUT_DIR: &str = "build/xcbundle";

/// Builds Xcode test bundles for running tests without building.
#[derive(Parser, Debug)]
#[command(name = "xcbundle", author, version, about = "Build and package Xcode test bundles", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true, env = "verbose_log")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run xcodebuild build-for-testing and export the test bundle.
    Build(BuildArgs),
    /// Write a starter xcbundle.toml.
    Init {
        #[arg(long, default_value = CONFIG_FILE_NAME)]
        output: PathBuf,
        #[arg(long, help = "Xcode project or workspace to put in the starter file")]
        project_path: Option<PathBuf>,
        #[arg(long, help = "Scheme to put in the starter file")]
        scheme: Option<String>,
    },
}

/// Step inputs. Unset values fall back to `xcbundle.toml`, then to defaults.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    #[arg(long, env = "project_path", help = "Path to the .xcodeproj or .xcworkspace")]
    pub project_path: Option<PathBuf>,
    #[arg(long, env = "scheme")]
    pub scheme: Option<String>,
    #[arg(long, env = "configuration", help = "Build configuration (default: the scheme's)")]
    pub configuration: Option<String>,
    #[arg(long, env = "destination", help = "xcodebuild -destination specifier")]
    pub destination: Option<String>,
    #[arg(long, env = "test_plan")]
    pub test_plan: Option<String>,
    #[arg(long, env = "xcconfig_content", help = "Build settings written to a temporary .xcconfig")]
    pub xcconfig_content: Option<String>,
    #[arg(
        long,
        env = "xcodebuild_options",
        allow_hyphen_values = true,
        help = "Additional xcodebuild options, split with shell quoting rules"
    )]
    pub xcodebuild_options: Option<String>,
    #[arg(long, env = "log_formatter", help = "xcpretty or xcodebuild")]
    pub log_formatter: Option<String>,
    #[arg(long, env = "output_dir", help = "Directory for the raw log and testbundle.zip")]
    pub output_dir: Option<PathBuf>,
    #[arg(
        long,
        env = "skip_testing",
        value_delimiter = '\n',
        help = "Target/Class[/method] to skip; newline separated in the environment"
    )]
    pub skip_testing: Vec<String>,
    #[arg(long, env = "retry_on_invalid_package_cache", action = clap::ArgAction::Set)]
    pub retry_on_invalid_package_cache: Option<bool>,
    #[arg(long, value_enum, env = "automatic_code_signing")]
    pub automatic_code_signing: Option<AutomaticCodeSigning>,
    #[arg(long, env = "api_key_id")]
    pub api_key_id: Option<String>,
    #[arg(long, env = "api_key_issuer_id")]
    pub api_key_issuer_id: Option<String>,
    #[arg(long, env = "api_key_path")]
    pub api_key_path: Option<PathBuf>,
    #[arg(long, help = "Config file (default: discover xcbundle.toml)")]
    pub config: Option<PathBuf>,
}

/// Fully resolved inputs of one `build` run.
#[derive(Debug)]
pub struct StepConfig {
    pub invocation: BuildInvocation,
    pub log_formatter: LogFormatter,
    pub output_dir: PathBuf,
    pub skip_testing: Vec<String>,
    pub retry_on_invalid_package_cache: bool,
    pub signing: Option<ApiKeySigning>,
}

impl StepConfig {
    /// Merges CLI/env inputs with the config file and validates the result.
    pub fn resolve(args: BuildArgs, resolver: &ConfigResolver) -> Result<Self> {
        let file = resolver.build();
        let signing = resolver.signing();

        let project_path = args
            .project_path
            .or(file.project_path)
            .ok_or_else(|| anyhow!("project_path is required (--project-path or {})", CONFIG_FILE_NAME))?;
        let scheme = args
            .scheme
            .or(file.scheme)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("scheme is required (--scheme or {})", CONFIG_FILE_NAME))?;

        let options_line = args.xcodebuild_options.or(file.xcodebuild_options).unwrap_or_default();
        let options = shell_words::split(&options_line)
            .with_context(|| format!("parsing xcodebuild_options: {}", options_line))?;

        let xcconfig_content = args
            .xcconfig_content
            .or(file.xcconfig_content)
            .filter(|c| !c.trim().is_empty());
        if xcconfig_content.is_some() && find_option_value(&options, "-xcconfig").is_some() {
            bail!("`-xcconfig` option found in xcodebuild_options, it cannot be combined with xcconfig_content");
        }

        let log_formatter: LogFormatter = args
            .log_formatter
            .unwrap_or(file.log_formatter)
            .parse()?;

        let mut skip_testing: Vec<String> = args
            .skip_testing
            .into_iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();
        if skip_testing.is_empty() {
            skip_testing = file.skip_testing;
        }

        let signing = match args
            .automatic_code_signing
            .unwrap_or(signing.automatic_code_signing)
        {
            AutomaticCodeSigning::Off => None,
            AutomaticCodeSigning::ApiKey => Some(ApiKeySigning {
                key_id: args.api_key_id.or(signing.api_key_id).unwrap_or_default(),
                issuer_id: args
                    .api_key_issuer_id
                    .or(signing.api_key_issuer_id)
                    .unwrap_or_default(),
                key_path: args.api_key_path.or(signing.api_key_path).unwrap_or_default(),
            }),
        };

        let output_dir = resolver.resolve(
            args.output_dir,
            |c| c.output.output_dir.clone(),
            PathBuf::from(DEFAULT_OUTPUT_DIR),
        );

        Ok(Self {
            invocation: BuildInvocation {
                project_path,
                scheme,
                configuration: args.configuration.or(file.configuration).filter(|c| !c.is_empty()),
                destination: args.destination.unwrap_or(file.destination),
                test_plan: args.test_plan.or(file.test_plan).filter(|p| !p.is_empty()),
                options,
                xcconfig_content,
                auth: None,
            },
            log_formatter,
            output_dir,
            skip_testing,
            retry_on_invalid_package_cache: args
                .retry_on_invalid_package_cache
                .unwrap_or(file.retry_on_invalid_package_cache),
            signing,
        })
    }
}

pub fn run() -> Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build(args) => cmd_build(args),
        Command::Init {
            output,
            project_path,
            scheme,
        } => cmd_init(&output, project_path.as_deref(), scheme.as_deref()),
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the level.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn load_dotenv() {
    if let Ok(cwd) = std::env::current_dir() {
        let _ = dotenvy::from_path(cwd.join(".env.local"));
    }
}

fn cmd_build(args: BuildArgs) -> Result<()> {
    let resolver = ConfigResolver::new(args.config.as_deref())?;
    if let Some(path) = &resolver.config_path {
        info!("Using config file {:?}", path);
    }
    let step = StepConfig::resolve(args, &resolver)?;

    let xcode = XcodeVersion::detect().context("reading the Xcode version")?;
    info!("{} ({})", xcode.version, xcode.build_version);

    let formatter = prepare_log_formatter(step.log_formatter);
    let builder = TestBundleBuilder::system(formatter)
        .xcode_major(xcode.major)
        .retry_on_invalid_package_cache(step.retry_on_invalid_package_cache)
        .skip_testing(step.skip_testing.clone());
    let builder = match step.signing.clone() {
        Some(api_key) => builder.signing(api_key),
        None => builder.signing(SigningDisabled),
    };

    let output = builder.build(&step.invocation)?;
    let exporter = Exporter::new(default_sink(), &step.output_dir);
    let log_path = exporter.export_log(&output.log);

    match output.artifacts {
        Ok(artifacts) => {
            info!(
                "Built {} xctestrun file(s) for {}",
                artifacts.descriptors.len(),
                artifacts.platform
            );
            exporter.export_artifacts(&artifacts);
            Ok(())
        }
        Err(err) => {
            // BuildFailed already carries the tail in its message
            if !matches!(err, BuildError::BuildFailed { .. }) {
                eprintln!(
                    "Last lines of the build log:\n{}",
                    last_n_lines(&output.log, LOG_TAIL_LINES)
                );
            }
            if let Some(path) = log_path {
                warn!("The full build log is available at {:?}", path);
            }
            Err(anyhow::Error::new(err).context("build-for-testing failed"))
        }
    }
}

fn cmd_init(output: &Path, project_path: Option<&Path>, scheme: Option<&str>) -> Result<()> {
    ensure_can_write(output)?;
    let contents = XcbundleConfig::generate_starter_toml(project_path, scheme);
    fs::write(output, contents).with_context(|| format!("writing config to {:?}", output))?;
    println!("Wrote starter config to {:?}", output);
    Ok(())
}

fn ensure_can_write(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {:?}", path);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory {:?}", parent))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use tempfile::TempDir;

    fn args(project: &str, scheme: &str) -> BuildArgs {
        BuildArgs {
            project_path: Some(PathBuf::from(project)),
            scheme: Some(scheme.to_string()),
            ..Default::default()
        }
    }

    fn resolver_with(build: BuildConfig) -> ConfigResolver {
        ConfigResolver {
            config: Some(XcbundleConfig {
                build,
                ..Default::default()
            }),
            config_path: None,
        }
    }

    #[test]
    fn cli_parses_build_flags() {
        let cli = Cli::try_parse_from([
            "xcbundle",
            "build",
            "--project-path",
            "App.xcodeproj",
            "--scheme",
            "App",
            "--xcodebuild-options",
            "-quiet -derivedDataPath 'Derived Data'",
            "--retry-on-invalid-package-cache",
            "false",
        ])
        .unwrap();
        let Command::Build(args) = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(args.scheme.as_deref(), Some("App"));
        assert_eq!(args.retry_on_invalid_package_cache, Some(false));

        let step = StepConfig::resolve(args, &ConfigResolver::default()).unwrap();
        assert_eq!(
            step.invocation.options,
            vec!["-quiet", "-derivedDataPath", "Derived Data"]
        );
        assert!(!step.retry_on_invalid_package_cache);
    }

    #[test]
    fn defaults_without_config() {
        let step = StepConfig::resolve(args("App.xcodeproj", "App"), &ConfigResolver::default()).unwrap();
        assert_eq!(step.invocation.destination, config::DEFAULT_DESTINATION);
        assert_eq!(step.invocation.configuration, None);
        assert_eq!(step.log_formatter, LogFormatter::Xcpretty);
        assert_eq!(step.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert!(step.retry_on_invalid_package_cache);
        assert!(step.signing.is_none());
    }

    #[test]
    fn cli_values_override_config_file() {
        let resolver = resolver_with(BuildConfig {
            project_path: Some(PathBuf::from("FromFile.xcworkspace")),
            scheme: Some("FromFile".to_string()),
            test_plan: Some("FullTests".to_string()),
            log_formatter: "xcodebuild".to_string(),
            ..Default::default()
        });
        let mut cli = args("Cli.xcodeproj", "Cli");
        cli.log_formatter = Some("xcpretty".to_string());

        let step = StepConfig::resolve(cli, &resolver).unwrap();
        assert_eq!(step.invocation.project_path, PathBuf::from("Cli.xcodeproj"));
        assert_eq!(step.invocation.scheme, "Cli");
        assert_eq!(step.invocation.test_plan.as_deref(), Some("FullTests"));
        assert_eq!(step.log_formatter, LogFormatter::Xcpretty);
    }

    #[test]
    fn output_dir_prefers_cli_then_config_file() {
        let resolver = ConfigResolver {
            config: Some(XcbundleConfig {
                output: config::OutputConfig {
                    output_dir: Some(PathBuf::from("from-file")),
                },
                ..Default::default()
            }),
            config_path: None,
        };

        let step = StepConfig::resolve(args("App.xcodeproj", "App"), &resolver).unwrap();
        assert_eq!(step.output_dir, PathBuf::from("from-file"));

        let mut cli = args("App.xcodeproj", "App");
        cli.output_dir = Some(PathBuf::from("from-cli"));
        let step = StepConfig::resolve(cli, &resolver).unwrap();
        assert_eq!(step.output_dir, PathBuf::from("from-cli"));
    }

    #[test]
    fn missing_scheme_is_error() {
        let mut cli = args("App.xcodeproj", "");
        cli.scheme = None;
        let err = StepConfig::resolve(cli, &ConfigResolver::default()).unwrap_err();
        assert!(err.to_string().contains("scheme is required"));
    }

    #[test]
    fn xcconfig_option_conflicts_with_content() {
        let mut cli = args("App.xcodeproj", "App");
        cli.xcodebuild_options = Some("-xcconfig Custom.xcconfig".to_string());
        cli.xcconfig_content = Some("CODE_SIGNING_ALLOWED = NO".to_string());
        let err = StepConfig::resolve(cli, &ConfigResolver::default()).unwrap_err();
        assert!(err.to_string().contains("-xcconfig"));

        // blank content is ignored
        let mut cli = args("App.xcodeproj", "App");
        cli.xcodebuild_options = Some("-xcconfig Custom.xcconfig".to_string());
        cli.xcconfig_content = Some("  \n".to_string());
        let step = StepConfig::resolve(cli, &ConfigResolver::default()).unwrap();
        assert_eq!(step.invocation.xcconfig_content, None);
    }

    #[test]
    fn unbalanced_quotes_in_options_are_error() {
        let mut cli = args("App.xcodeproj", "App");
        cli.xcodebuild_options = Some("-derivedDataPath 'unterminated".to_string());
        assert!(StepConfig::resolve(cli, &ConfigResolver::default()).is_err());
    }

    #[test]
    fn unknown_log_formatter_is_error() {
        let mut cli = args("App.xcodeproj", "App");
        cli.log_formatter = Some("xcbeautify".to_string());
        assert!(StepConfig::resolve(cli, &ConfigResolver::default()).is_err());
    }

    #[test]
    fn skip_testing_entries_are_trimmed() {
        let mut cli = args("App.xcodeproj", "App");
        cli.skip_testing = vec![
            " AppTests/SlowTests ".to_string(),
            String::new(),
            "AppUITests/LaunchTests/testLaunch".to_string(),
        ];
        let step = StepConfig::resolve(cli, &ConfigResolver::default()).unwrap();
        assert_eq!(
            step.skip_testing,
            vec!["AppTests/SlowTests", "AppUITests/LaunchTests/testLaunch"]
        );
    }

    #[test]
    fn api_key_signing_from_flags() {
        let mut cli = args("App.xcodeproj", "App");
        cli.automatic_code_signing = Some(AutomaticCodeSigning::ApiKey);
        cli.api_key_id = Some("KEY".to_string());
        cli.api_key_issuer_id = Some("ISSUER".to_string());
        cli.api_key_path = Some(PathBuf::from("AuthKey.p8"));

        let signing = StepConfig::resolve(cli, &ConfigResolver::default())
            .unwrap()
            .signing
            .unwrap();
        assert_eq!(signing.key_id, "KEY");
        assert_eq!(signing.issuer_id, "ISSUER");
        assert_eq!(signing.key_path, PathBuf::from("AuthKey.p8"));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        cmd_init(&path, Some(Path::new("App.xcodeproj")), Some("App")).unwrap();
        let written = XcbundleConfig::load_from_file(&path).unwrap();
        assert_eq!(written.build.scheme.as_deref(), Some("App"));

        let err = cmd_init(&path, None, None).unwrap_err();
        assert!(err.to_string().contains("refusing to overwrite"));
    }
}
