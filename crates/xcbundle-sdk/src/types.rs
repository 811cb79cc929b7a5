//! Core types for xcbundle-sdk.
//!
//! This module defines the fundamental types used throughout the SDK:
//!
//! - [`BuildError`] - Error taxonomy for build execution and output discovery
//! - [`BuildInvocation`] - Parameters of one `xcodebuild build-for-testing` run
//! - [`TimeInterval`] - Wall-clock window bracketing a build
//! - [`BuildRun`] - Captured log, window and outcome of a build
//! - [`SdkPlatform`] - Destination class inferred from xctestrun file names
//! - [`CandidateArtifact`] / [`ArtifactSet`] - Discovery results
//! - [`SchemeTestPlans`] - Test plan metadata of a scheme

use std::path::PathBuf;
use std::time::SystemTime;

use crate::codesign::AuthParams;

/// Error types for xcbundle-sdk operations.
///
/// Discovery errors are always returned to the caller, never logged and
/// swallowed. A corrupted dependency cache is not represented here: it is
/// recovered internally by [`crate::runner::RetryingBuildExecutor`] and
/// surfaces as [`BuildError::BuildFailed`] only when the retry fails too.
///
/// # Example
///
/// ```ignore
/// use xcbundle_sdk::BuildError;
///
/// match locator.locate(&request, &interval) {
///     Ok(set) => println!("default xctestrun: {:?}", set.default_descriptor),
///     Err(BuildError::NoArtifactsFound { root, .. }) => {
///         eprintln!("nothing was generated in {:?}", root);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An external tool could not be started at all.
    #[error("failed to start {program}: {source}. Ensure the tool is installed and available on PATH")]
    Command {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The build exited non-zero and was not recovered by a retry.
    ///
    /// `log_tail` holds the last lines of the captured build log.
    #[error("xcodebuild failed ({status})\n\nLast lines of the build log:\n{log_tail}")]
    BuildFailed { status: String, log_tail: String },

    /// Removing a corrupted dependency cache before the retry failed.
    #[error("failed to remove invalid Swift package cache at {path:?}: {source}")]
    CacheCleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No xctestrun file was generated inside the build's time window.
    #[error("no xctestrun file generated during the build in {root:?}: {reason}")]
    NoArtifactsFound { root: PathBuf, reason: String },

    /// The built products subdirectory that belongs to the xctestrun files is missing.
    #[error("built test directory does not exist at: {path:?}")]
    MissingBuildOutput { path: PathBuf },

    /// The discovered xctestrun files were built for different destination classes.
    #[error(
        "xctestrun files were generated for conflicting destinations: {platforms:?}. \
         Set a single destination for the build"
    )]
    AmbiguousDestination { platforms: Vec<String> },

    /// Reading build settings or scheme metadata failed.
    #[error("failed to read project metadata: {0}")]
    MetadataRead(String),

    /// A test plan document did not have the expected structure.
    #[error("test plan error: {0}")]
    TestPlan(String),

    /// Code signing assets could not be prepared.
    #[error("code signing error: {0}")]
    Signing(String),

    /// Invalid step configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),
}

/// Parameters for one build run.
///
/// Constructed once from the step configuration and never mutated
/// afterwards; the builder derives the xcodebuild command from it.
#[derive(Debug, Clone)]
pub struct BuildInvocation {
    /// Path to the `.xcodeproj` or `.xcworkspace`.
    pub project_path: PathBuf,
    /// Scheme to build.
    pub scheme: String,
    /// Requested build configuration. `None` uses the scheme's default.
    pub configuration: Option<String>,
    /// `-destination` specifier, e.g. `generic/platform=iOS Simulator`.
    pub destination: String,
    /// Test plan to build, if the scheme uses test plans.
    pub test_plan: Option<String>,
    /// Additional xcodebuild option tokens, already shell-split.
    pub options: Vec<String>,
    /// Build settings overrides, written to a temporary `.xcconfig`.
    pub xcconfig_content: Option<String>,
    /// Pass-through credentials from the code signing provider.
    pub auth: Option<AuthParams>,
}

/// Wall-clock window bracketing a single build invocation.
///
/// Opened immediately before the build process starts and closed
/// immediately after it exits. `start <= end` holds once closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeInterval {
    pub start: SystemTime,
    pub end: SystemTime,
}

impl TimeInterval {
    /// Creates a closed interval.
    pub fn new(start: SystemTime, end: SystemTime) -> Self {
        Self { start, end }
    }

    /// Opens an interval at the current instant.
    pub fn open() -> Self {
        let now = SystemTime::now();
        Self {
            start: now,
            end: now,
        }
    }

    /// Closes the interval at the current instant.
    pub fn close(&mut self) {
        let now = SystemTime::now();
        self.end = if now < self.start { self.start } else { now };
    }

    /// Returns `true` if `instant` lies within `[start, end]`.
    pub fn contains(&self, instant: SystemTime) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// Outcome of running the build tool.
///
/// The log is handed to the caller in every case so that it can be printed
/// and exported even when the build failed.
#[derive(Debug)]
pub struct BuildRun {
    /// Combined stdout/stderr of xcodebuild.
    pub log: String,
    /// Window of the attempt whose log is reported.
    pub interval: TimeInterval,
    /// `Ok(())` when the build exited successfully.
    pub outcome: Result<(), BuildError>,
}

impl BuildRun {
    /// Returns `true` if the build succeeded.
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Platform (destination class) a test bundle was built for.
///
/// Inferred from the platform token of an xctestrun file name:
/// `<scheme>[_<test plan>]_<platform><os version>-<arch>.xctestrun`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkPlatform {
    IphoneSimulator,
    IphoneOs,
    AppleTvSimulator,
    AppleTvOs,
    WatchSimulator,
    WatchOs,
    XrSimulator,
    XrOs,
    MacOsx,
}

impl SdkPlatform {
    const ALL: [SdkPlatform; 9] = [
        SdkPlatform::IphoneSimulator,
        SdkPlatform::IphoneOs,
        SdkPlatform::AppleTvSimulator,
        SdkPlatform::AppleTvOs,
        SdkPlatform::WatchSimulator,
        SdkPlatform::WatchOs,
        SdkPlatform::XrSimulator,
        SdkPlatform::XrOs,
        SdkPlatform::MacOsx,
    ];

    /// Returns the SDK platform name used in build product directory names.
    pub fn as_str(&self) -> &'static str {
        match self {
            SdkPlatform::IphoneSimulator => "iphonesimulator",
            SdkPlatform::IphoneOs => "iphoneos",
            SdkPlatform::AppleTvSimulator => "appletvsimulator",
            SdkPlatform::AppleTvOs => "appletvos",
            SdkPlatform::WatchSimulator => "watchsimulator",
            SdkPlatform::WatchOs => "watchos",
            SdkPlatform::XrSimulator => "xrsimulator",
            SdkPlatform::XrOs => "xros",
            SdkPlatform::MacOsx => "macosx",
        }
    }

    /// Parses a platform name such as `iphonesimulator`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// Infers the platform from an xctestrun file name.
    ///
    /// The platform segment is the last `_`-separated segment that starts
    /// with a known platform name followed by the OS version and
    /// architecture (`iphonesimulator17.2-arm64`). Segments are scanned from
    /// the end because architecture lists such as `arm64-x86_64` contain
    /// underscores themselves.
    pub fn from_xctestrun_name(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".xctestrun").unwrap_or(file_name);
        let segments: Vec<&str> = stem.split('_').collect();
        // the first segment is the scheme name
        segments.iter().skip(1).rev().find_map(|segment| {
            let name: String = segment
                .chars()
                .take_while(|c| c.is_ascii_alphabetic())
                .collect();
            Self::from_name(&name.to_ascii_lowercase())
        })
    }

    /// Name of the built products subdirectory under the products root.
    ///
    /// macOS products live directly in `<configuration>`, every other
    /// platform in `<configuration>-<platform>`.
    pub fn products_dir_name(&self, configuration: &str) -> String {
        match self {
            SdkPlatform::MacOsx => configuration.to_string(),
            other => format!("{}-{}", configuration, other.as_str()),
        }
    }
}

impl std::fmt::Display for SdkPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An xctestrun file found under the products root, with its modification time.
///
/// Rebuilt on every discovery call; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateArtifact {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// The resolved result of a build's output discovery.
///
/// Descriptor order is discovery order, which is deterministic (sorted by
/// file name) but carries no meaning beyond that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    /// Every xctestrun file generated during the build.
    pub descriptors: Vec<PathBuf>,
    /// The xctestrun file of the scheme's default test plan.
    pub default_descriptor: PathBuf,
    /// Root directory of all build products (SYMROOT).
    pub products_root: PathBuf,
    /// Built products subdirectory, e.g. `<root>/Debug-iphonesimulator`.
    pub built_products_dir: PathBuf,
    /// Destination class the descriptors were built for.
    pub platform: SdkPlatform,
}

/// Test plan metadata of a scheme.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemeTestPlans {
    /// Scheme name.
    pub scheme: String,
    /// Name of the test plan marked as default, if any.
    pub default_test_plan: Option<String>,
    /// Names of all test plans referenced by the scheme.
    pub test_plans: Vec<String>,
}
