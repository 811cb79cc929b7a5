//! Export of build outputs to the CI environment.
//!
//! | Key | Value |
//! |-----|-------|
//! | `BITRISE_XCODE_RAW_RESULT_TEXT_PATH` | `<output_dir>/raw-xcodebuild-output.log` |
//! | `BITRISE_TEST_BUNDLE_PATH` | products root (SYMROOT) |
//! | `BITRISE_TEST_BUNDLE_ZIP_PATH` | `<output_dir>/testbundle.zip` |
//! | `BITRISE_XCTESTRUN_FILE_PATH` | default xctestrun file |
//!
//! Every failure here is logged as a warning. The build already succeeded
//! or failed by the time outputs are exported.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};
use xcbundle_sdk::builders::run_command;
use xcbundle_sdk::{ArtifactSet, CommandSpec};

pub const RAW_LOG_PATH_KEY: &str = "BITRISE_XCODE_RAW_RESULT_TEXT_PATH";
pub const TEST_BUNDLE_PATH_KEY: &str = "BITRISE_TEST_BUNDLE_PATH";
pub const TEST_BUNDLE_ZIP_PATH_KEY: &str = "BITRISE_TEST_BUNDLE_ZIP_PATH";
pub const XCTESTRUN_FILE_PATH_KEY: &str = "BITRISE_XCTESTRUN_FILE_PATH";

pub const RAW_LOG_FILE_NAME: &str = "raw-xcodebuild-output.log";
pub const TEST_BUNDLE_ZIP_NAME: &str = "testbundle.zip";

/// Destination of exported key/value outputs.
pub trait OutputSink {
    fn export(&self, key: &str, value: &str) -> Result<()>;
}

/// Exports through `envman add`, making values visible to later CI steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvmanSink;

impl EnvmanSink {
    /// Returns `true` if `envman` can be executed.
    pub fn is_available() -> bool {
        Command::new("envman")
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

impl OutputSink for EnvmanSink {
    fn export(&self, key: &str, value: &str) -> Result<()> {
        let mut cmd = Command::new("envman");
        cmd.args(["add", "--key", key, "--value", value]);
        run_command(cmd, "envman add").with_context(|| format!("exporting {}", key))?;
        Ok(())
    }
}

/// Prints `KEY=value` lines to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn export(&self, key: &str, value: &str) -> Result<()> {
        println!("{}={}", key, value);
        Ok(())
    }
}

/// `envman` when present, stdout otherwise.
pub fn default_sink() -> Box<dyn OutputSink> {
    if EnvmanSink::is_available() {
        Box::new(EnvmanSink)
    } else {
        info!("envman not found, printing outputs to stdout");
        Box::new(StdoutSink)
    }
}

/// Writes the build log and test bundle into the output directory and
/// exports their locations.
pub struct Exporter {
    sink: Box<dyn OutputSink>,
    output_dir: PathBuf,
    zip_program: String,
}

impl Exporter {
    pub fn new(sink: Box<dyn OutputSink>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            sink,
            output_dir: output_dir.into(),
            zip_program: "zip".to_string(),
        }
    }

    /// Overrides the archiver executable.
    pub fn zip_program(mut self, program: impl Into<String>) -> Self {
        self.zip_program = program.into();
        self
    }

    /// Saves the raw build log and exports its path.
    pub fn export_log(&self, log: &str) -> Option<PathBuf> {
        match self.write_log(log) {
            Ok(path) => {
                self.export(RAW_LOG_PATH_KEY, &path);
                Some(path)
            }
            Err(e) => {
                warn!("Failed to export {}: {:#}", RAW_LOG_PATH_KEY, e);
                None
            }
        }
    }

    fn write_log(&self, log: &str) -> Result<PathBuf> {
        let dir = self.absolute_output_dir()?;
        fs::create_dir_all(&dir).with_context(|| format!("creating directory {:?}", dir))?;
        let path = dir.join(RAW_LOG_FILE_NAME);
        fs::write(&path, log).with_context(|| format!("writing {:?}", path))?;
        Ok(path)
    }

    /// Exports the products root, the zipped test bundle and the default
    /// xctestrun file.
    pub fn export_artifacts(&self, artifacts: &ArtifactSet) {
        self.export(TEST_BUNDLE_PATH_KEY, &artifacts.products_root);

        match self.zip_test_bundle(artifacts) {
            Ok(zip_path) => self.export(TEST_BUNDLE_ZIP_PATH_KEY, &zip_path),
            Err(e) => warn!("Failed to export {}: {:#}", TEST_BUNDLE_ZIP_PATH_KEY, e),
        }

        if artifacts.descriptors.len() > 1 {
            warn!(
                "Multiple xctestrun files generated, exporting {:?} as {}. All of them are part of the zipped test bundle",
                artifacts.default_descriptor, XCTESTRUN_FILE_PATH_KEY
            );
        }
        self.export(XCTESTRUN_FILE_PATH_KEY, &artifacts.default_descriptor);
    }

    fn export(&self, key: &str, value: &Path) {
        let value = value.display().to_string();
        match self.sink.export(key, &value) {
            Ok(()) => info!("The {} output is available: {}", key, value),
            Err(e) => warn!("Failed to export {}: {:#}", key, e),
        }
    }

    fn zip_test_bundle(&self, artifacts: &ArtifactSet) -> Result<PathBuf> {
        let dir = self.absolute_output_dir()?;
        fs::create_dir_all(&dir).with_context(|| format!("creating directory {:?}", dir))?;
        let zip_path = dir.join(TEST_BUNDLE_ZIP_NAME);
        if zip_path.exists() {
            fs::remove_file(&zip_path).with_context(|| format!("removing stale {:?}", zip_path))?;
        }

        let spec = self.zip_spec(artifacts, &zip_path)?;
        info!("$ {}", spec);
        run_command(spec.to_command(), "zip test bundle")?;
        Ok(zip_path)
    }

    /// `zip -r <zip> <built products dir> <xctestrun files…>`, run inside
    /// the products root so the archive holds root-relative paths.
    pub fn zip_spec(&self, artifacts: &ArtifactSet, zip_path: &Path) -> Result<CommandSpec> {
        let root = &artifacts.products_root;
        let mut spec = CommandSpec::new(&self.zip_program)
            .arg("-r")
            .arg(zip_path.display().to_string())
            .current_dir(root);

        spec = spec.arg(relative_to(&artifacts.built_products_dir, root)?);
        for descriptor in &artifacts.descriptors {
            spec = spec.arg(relative_to(descriptor, root)?);
        }
        Ok(spec)
    }

    fn absolute_output_dir(&self) -> Result<PathBuf> {
        std::path::absolute(&self.output_dir)
            .with_context(|| format!("resolving output directory {:?}", self.output_dir))
    }
}

fn relative_to(path: &Path, root: &Path) -> Result<String> {
    match path.strip_prefix(root) {
        Ok(relative) => Ok(relative.display().to_string()),
        Err(_) => bail!("{:?} is not inside the products root {:?}", path, root),
    }
}
