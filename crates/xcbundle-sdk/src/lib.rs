//! Xcode test bundle SDK for Rust
//!
//! `xcbundle-sdk` runs `xcodebuild build-for-testing` and finds what it
//! produced. xcodebuild has no "list what you just built" API, so the
//! generated `.xctestrun` files are discovered under the products root,
//! time-windowed to the build and disambiguated with the scheme's default
//! test plan.
//!
//! # Architecture
//!
//! The SDK consists of several components:
//!
//! - **Runner**: [`SystemRunner`] executes the build tool and captures its
//!   output; [`RetryingBuildExecutor`] retries once after clearing a
//!   corrupted Swift package cache
//! - **Discovery**: [`BuildOutputLocator`] drives candidate enumeration,
//!   the [`ModificationTimeWindowFilter`] and default resolution
//! - **Builders**: [`TestBundleBuilder`] wires signing, test plan edits,
//!   the products root, the build and the discovery together
//! - **Xcode collaborators**: build settings, schemes, xcpretty, xcconfig
//!   files and xctestrun fixes in [`xcode`]
//!
//! # Example: Programmatic Usage
//!
//! ```ignore
//! use std::path::PathBuf;
//! use xcbundle_sdk::{BuildInvocation, LogFormatter, TestBundleBuilder};
//!
//! fn main() -> Result<(), xcbundle_sdk::BuildError> {
//!     let invocation = BuildInvocation {
//!         project_path: PathBuf::from("BullsEye.xcodeproj"),
//!         scheme: "BullsEye".to_string(),
//!         configuration: None,
//!         destination: "generic/platform=iOS Simulator".to_string(),
//!         test_plan: None,
//!         options: Vec::new(),
//!         xcconfig_content: None,
//!         auth: None,
//!     };
//!
//!     let output = TestBundleBuilder::system(LogFormatter::Xcodebuild).build(&invocation)?;
//!     let artifacts = output.artifacts?;
//!     println!("xctestrun: {}", artifacts.default_descriptor.display());
//!     Ok(())
//! }
//! ```

// Public modules
pub mod builders;
pub mod codesign;
pub mod discovery;
pub mod runner;
pub mod types;
pub mod xcode;

// Re-export key types for convenience
pub use builders::{CommandSpec, TestBundleBuilder, TestBundleOutput, XcodebuildCommand};
pub use codesign::{ApiKeySigning, AuthParams, CodesignProvider, SigningDisabled};
pub use discovery::{
    BuildOutputLocator, CandidateEnumerator, DefaultResolver, LocateRequest,
    ModificationTimeWindowFilter,
};
pub use runner::{ProcessOutput, ProcessRunner, RetryingBuildExecutor, SystemRunner};
pub use types::{
    ArtifactSet, BuildError, BuildInvocation, BuildRun, CandidateArtifact,
    SchemeTestPlans, SdkPlatform, TimeInterval,
};
pub use xcode::{LogFormatter, XcodeVersion};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
