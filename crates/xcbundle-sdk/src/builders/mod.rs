//! Build automation for Xcode test bundles.
//!
//! ## Overview
//!
//! [`TestBundleBuilder`] handles the complete pipeline:
//!
//! 1. **Code signing** - Prepare credentials through a [`crate::CodesignProvider`]
//! 2. **Test plan edits** - Inject `skip_testing` entries into the test plan
//! 3. **Products root** - Force a fresh `SYMROOT` unless one is given
//! 4. **Build** - Run `xcodebuild build-for-testing`, retrying once on a corrupted package cache
//! 5. **Discovery** - Locate the xctestrun files and built products of this build
//!
//! ## Common Utilities
//!
//! The [`common`] module provides shared functionality:
//!
//! - Project path validation
//! - Build setting and option lookup in xcodebuild option lists
//! - Consistent command execution with actionable error messages

pub mod common;
pub mod ios;
pub mod xcodebuild;

pub use common::{find_build_setting, find_option_value, last_n_lines, run_command};
pub use ios::{TestBundleBuilder, TestBundleOutput};
pub use xcodebuild::{BUILD_FOR_TESTING, CommandSpec, XcodebuildCommand};
