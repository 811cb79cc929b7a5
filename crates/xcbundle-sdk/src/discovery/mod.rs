//! Build output discovery.
//!
//! xcodebuild offers no way to ask what a `build-for-testing` run produced.
//! The artifacts are found by enumerating the products root, keeping the
//! files modified during the build and picking a default among them.
//!
//! Both the enumeration and the disambiguation are strategies:
//!
//! - [`CandidateEnumerator`]: [`DirectoryListing`] (default) or [`GlobPattern`]
//! - [`DefaultResolver`]: [`DefaultTestPlanResolver`] (default) or [`FirstCandidateResolver`]

pub mod candidates;
pub mod locator;
pub mod resolver;
pub mod window;

pub use candidates::{CandidateEnumerator, DirectoryListing, GlobPattern};
pub use locator::{BuildOutputLocator, LocateRequest, destination_platform};
pub use resolver::{DefaultResolver, DefaultTestPlanResolver, FirstCandidateResolver, resolve_default};
pub use window::ModificationTimeWindowFilter;
