//! iOS test bundle builder.
//!
//! Runs `xcodebuild build-for-testing` into a dedicated products root and
//! locates the xctestrun files and built products it generated.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::builders::common::{find_build_setting, validate_project_path};
use crate::builders::xcodebuild::{BUILD_FOR_TESTING, XcodebuildCommand};
use crate::codesign::{CodesignProvider, SigningDisabled};
use crate::discovery::{BuildOutputLocator, LocateRequest};
use crate::runner::{ProcessRunner, RetryingBuildExecutor, SystemRunner};
use crate::types::{ArtifactSet, BuildError, BuildInvocation, TimeInterval};
use crate::xcode::cache::swift_packages_path;
use crate::xcode::formatter::LogFormatter;
use crate::xcode::scheme::{SchemeReader, XcschemeReader};
use crate::xcode::settings::{BuildSettingsReader, XcodebuildSettingsReader};
use crate::xcode::test_plan;
use crate::xcode::xcconfig::XcconfigWriter;

/// First Xcode major version with Swift package support.
const SWIFT_PACKAGES_MIN_XCODE: u32 = 11;

/// Result of a build that got as far as running xcodebuild.
#[derive(Debug)]
pub struct TestBundleOutput {
    /// Raw xcodebuild output of the reported attempt.
    pub log: String,
    /// Window of the reported attempt.
    pub interval: TimeInterval,
    /// The located artifacts, or why the build or the discovery failed.
    pub artifacts: Result<ArtifactSet, BuildError>,
}

/// Builds test bundles with `xcodebuild build-for-testing`.
///
/// # Example
///
/// ```ignore
/// use xcbundle_sdk::builders::TestBundleBuilder;
/// use xcbundle_sdk::xcode::LogFormatter;
///
/// let builder = TestBundleBuilder::system(LogFormatter::Xcpretty).xcode_major(15);
/// let output = builder.build(&invocation)?;
/// let artifacts = output.artifacts?;
/// println!("default xctestrun: {:?}", artifacts.default_descriptor);
/// ```
pub struct TestBundleBuilder<B, S, R> {
    settings: B,
    schemes: S,
    runner: R,
    signing: Box<dyn CodesignProvider>,
    xcconfig: XcconfigWriter,
    skip_testing: Vec<String>,
    xcode_major: Option<u32>,
    retry_on_invalid_package_cache: bool,
}

impl TestBundleBuilder<XcodebuildSettingsReader, XcschemeReader, SystemRunner> {
    /// Builder driving the installed Xcode.
    pub fn system(formatter: LogFormatter) -> Self {
        Self::new(
            XcodebuildSettingsReader,
            XcschemeReader,
            SystemRunner::new(formatter),
        )
    }
}

impl<B: BuildSettingsReader, S: SchemeReader, R: ProcessRunner> TestBundleBuilder<B, S, R> {
    pub fn new(settings: B, schemes: S, runner: R) -> Self {
        Self {
            settings,
            schemes,
            runner,
            signing: Box::new(SigningDisabled),
            xcconfig: XcconfigWriter::new(),
            skip_testing: Vec::new(),
            xcode_major: None,
            retry_on_invalid_package_cache: true,
        }
    }

    /// Sets the code signing provider. Signing is disabled by default.
    pub fn signing(mut self, provider: impl CodesignProvider + 'static) -> Self {
        self.signing = Box::new(provider);
        self
    }

    pub fn xcconfig_writer(mut self, writer: XcconfigWriter) -> Self {
        self.xcconfig = writer;
        self
    }

    /// Tests to skip, as `Target/Class[/method]`. Requires a test plan.
    pub fn skip_testing(mut self, entries: Vec<String>) -> Self {
        self.skip_testing = entries;
        self
    }

    /// Major version of the Xcode in use. Package cache recovery needs 11+.
    pub fn xcode_major(mut self, major: u32) -> Self {
        self.xcode_major = Some(major);
        self
    }

    /// Enables or disables the retry after removing a corrupted package cache.
    pub fn retry_on_invalid_package_cache(mut self, enabled: bool) -> Self {
        self.retry_on_invalid_package_cache = enabled;
        self
    }

    /// Runs the build and locates its outputs.
    ///
    /// Errors raised before xcodebuild starts are returned directly. Once
    /// xcodebuild ran, its log is always returned so it can be exported,
    /// and build or discovery failures are carried in
    /// [`TestBundleOutput::artifacts`].
    pub fn build(&self, invocation: &BuildInvocation) -> Result<TestBundleOutput, BuildError> {
        validate_project_path(&invocation.project_path)?;

        let mut invocation = invocation.clone();
        if let Some(auth) = self.signing.prepare_signing()? {
            invocation.auth = Some(auth);
        }

        if !self.skip_testing.is_empty() {
            let plan = invocation.test_plan.as_deref().ok_or_else(|| {
                BuildError::Config("skip testing requires a test plan to be set".to_string())
            })?;
            test_plan::skip_testing(&invocation.project_path, plan, &self.skip_testing)?;
        }

        let cache_path = self.swift_packages_cache(&invocation)?;

        match find_build_setting(&invocation.options, "SYMROOT") {
            Some(products_root) => {
                info!("Using SYMROOT from the xcodebuild options: {}", products_root);
            }
            None => {
                let root = create_products_root()?;
                info!("Building into {}", root.display());
                invocation.options.push(format!("SYMROOT={}", root.display()));
            }
        }

        let mut command = XcodebuildCommand::build_for_testing(&invocation);
        if let Some(content) = invocation
            .xcconfig_content
            .as_deref()
            .filter(|content| !content.trim().is_empty())
        {
            command = command.xcconfig_path(self.xcconfig.write(content)?);
        }

        info!("Running xcodebuild");
        let executor = RetryingBuildExecutor::new(&self.runner, cache_path);
        let run = executor.run(&command.to_spec());

        let artifacts = run.outcome.and_then(|()| {
            info!("Searching for outputs");
            let locator = BuildOutputLocator::new(&self.settings, &self.schemes);
            locator.locate(
                &LocateRequest {
                    project_path: &invocation.project_path,
                    scheme: &invocation.scheme,
                    configuration: invocation.configuration.as_deref(),
                    options: &invocation.options,
                },
                &run.interval,
            )
        });

        Ok(TestBundleOutput {
            log: run.log,
            interval: run.interval,
            artifacts,
        })
    }

    /// Swift packages cache to clear when xcodebuild reports it invalid.
    ///
    /// Failing to read the build settings needed to locate the cache is
    /// fatal, so the retry is never silently lost.
    fn swift_packages_cache(&self, invocation: &BuildInvocation) -> Result<Option<PathBuf>, BuildError> {
        if !self.retry_on_invalid_package_cache {
            return Ok(None);
        }
        if self.xcode_major.is_some_and(|major| major < SWIFT_PACKAGES_MIN_XCODE) {
            return Ok(None);
        }
        if let Some(path) = swift_packages_path(&invocation.options, None) {
            return Ok(Some(path));
        }

        let settings = self
            .settings
            .show_build_settings(
                &invocation.project_path,
                &invocation.scheme,
                invocation.configuration.as_deref(),
                BUILD_FOR_TESTING,
                &invocation.options,
            )
            .map_err(|e| {
                BuildError::MetadataRead(format!(
                    "failed to get Swift packages path: {}. \
                     Pass -clonedSourcePackagesDirPath in the xcodebuild options \
                     or disable retry_on_invalid_package_cache",
                    e
                ))
            })?;
        let path = swift_packages_path(&[], Some(Path::new(settings.get("BUILD_DIR")?)));
        match &path {
            Some(path) => info!("Swift packages cache: {}", path.display()),
            None => warn!(
                "BUILD_DIR is not inside DerivedData, retry on invalid package cache is disabled"
            ),
        }
        Ok(path)
    }
}

/// Creates a fresh products root (`SYMROOT`) that outlives the process.
fn create_products_root() -> Result<PathBuf, BuildError> {
    Ok(tempfile::Builder::new()
        .prefix("test_bundle")
        .tempdir()?
        .keep())
}
