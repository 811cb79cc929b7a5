//! Xcode collaborators used around the build.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`settings`] | `xcodebuild -showBuildSettings` reader and parser |
//! | [`scheme`] | Test plan metadata from `.xcscheme` files |
//! | [`version`] | Installed Xcode version |
//! | [`cache`] | Swift package cache location and invalid-state marker |
//! | [`formatter`] | Optional xcpretty log formatting |
//! | [`xcconfig`] | Temporary `.xcconfig` for build setting overrides |
//! | [`xctestrun`] | Post-build fixes of xctestrun files |
//! | [`test_plan`] | Skipping tests through an `.xctestplan` |

pub mod cache;
pub mod formatter;
pub mod scheme;
pub mod settings;
pub mod test_plan;
pub mod version;
pub mod xcconfig;
pub mod xctestrun;

pub use cache::{SWIFT_PACKAGES_STATE_INVALID, swift_packages_path};
pub use formatter::{LogFormatter, Xcpretty, prepare_log_formatter};
pub use scheme::{SchemeReader, XcschemeReader};
pub use settings::{BuildSettings, BuildSettingsReader, XcodebuildSettingsReader, parse_show_build_settings};
pub use version::XcodeVersion;
pub use xcconfig::XcconfigWriter;
pub use xctestrun::{fix_test_root, fix_test_root_in_file};
