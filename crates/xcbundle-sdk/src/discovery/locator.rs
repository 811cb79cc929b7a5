//! Discovery of the artifacts produced by a `build-for-testing` run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::builders::xcodebuild::BUILD_FOR_TESTING;
use crate::discovery::candidates::{CandidateEnumerator, DirectoryListing};
use crate::discovery::resolver::{DefaultResolver, DefaultTestPlanResolver};
use crate::discovery::window::ModificationTimeWindowFilter;
use crate::types::{ArtifactSet, BuildError, SdkPlatform, TimeInterval};
use crate::xcode::scheme::SchemeReader;
use crate::xcode::settings::BuildSettingsReader;
use crate::xcode::xctestrun::fix_test_root_in_file;

/// What to look for: the same project, scheme, configuration and options
/// the build ran with.
#[derive(Debug, Clone, Copy)]
pub struct LocateRequest<'a> {
    pub project_path: &'a Path,
    pub scheme: &'a str,
    pub configuration: Option<&'a str>,
    pub options: &'a [String],
}

/// Finds, time-windows and disambiguates the xctestrun files of a build.
///
/// The pipeline is linear and every step either feeds the next one or ends
/// with a typed error:
///
/// 1. read `SYMROOT` and `CONFIGURATION` from the build settings
/// 2. enumerate candidate xctestrun files under the products root
/// 3. keep candidates modified within the build's time window
/// 4. fail with [`BuildError::NoArtifactsFound`] if none remain
/// 5. a single candidate is the default
/// 6. otherwise resolve the default from the scheme's default test plan
/// 7. derive and verify the built products directory
/// 8. fix test root placeholders and return the [`ArtifactSet`]
pub struct BuildOutputLocator<B, S> {
    settings: B,
    schemes: S,
    enumerator: Box<dyn CandidateEnumerator>,
    resolver: Box<dyn DefaultResolver>,
    window: ModificationTimeWindowFilter,
}

impl<B: BuildSettingsReader, S: SchemeReader> BuildOutputLocator<B, S> {
    /// Creates a locator listing the products root and resolving by test plan.
    pub fn new(settings: B, schemes: S) -> Self {
        Self {
            settings,
            schemes,
            enumerator: Box::new(DirectoryListing),
            resolver: Box::new(DefaultTestPlanResolver),
            window: ModificationTimeWindowFilter,
        }
    }

    pub fn with_enumerator(mut self, enumerator: impl CandidateEnumerator + 'static) -> Self {
        self.enumerator = Box::new(enumerator);
        self
    }

    pub fn with_resolver(mut self, resolver: impl DefaultResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Locates the artifacts the build produced during `interval`.
    pub fn locate(&self, request: &LocateRequest<'_>, interval: &TimeInterval) -> Result<ArtifactSet, BuildError> {
        let settings = self.settings.show_build_settings(
            request.project_path,
            request.scheme,
            request.configuration,
            BUILD_FOR_TESTING,
            request.options,
        )?;
        let products_root = PathBuf::from(settings.get("SYMROOT")?);
        let configuration = settings.get("CONFIGURATION")?.to_string();
        info!("SYMROOT: {}", products_root.display());

        let found = self.enumerator.enumerate(&products_root, request.scheme)?;
        if found.is_empty() {
            return Err(BuildError::NoArtifactsFound {
                root: products_root,
                reason: "no xctestrun file found".to_string(),
            });
        }
        let found_count = found.len();

        let admitted = self.window.admit(found, interval)?;
        if admitted.is_empty() {
            return Err(BuildError::NoArtifactsFound {
                root: products_root,
                reason: format!(
                    "{} xctestrun file(s) found, none of them was modified during the build",
                    found_count
                ),
            });
        }
        let descriptors: Vec<PathBuf> = admitted.into_iter().map(|c| c.path).collect();
        info!(
            "xctestrun file(s) generated during the build:\n- {}",
            descriptors
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n- ")
        );

        let default_descriptor = self.default_descriptor(request, &products_root, &descriptors)?;

        let platform = destination_platform(&descriptors)?;
        let built_products_dir = products_root.join(platform.products_dir_name(&configuration));
        if !built_products_dir.is_dir() {
            return Err(BuildError::MissingBuildOutput {
                path: built_products_dir,
            });
        }
        info!("Built test directory: {}", built_products_dir.display());

        for descriptor in &descriptors {
            fix_test_root_in_file(descriptor)?;
        }

        Ok(ArtifactSet {
            descriptors,
            default_descriptor,
            products_root,
            built_products_dir,
            platform,
        })
    }

    fn default_descriptor(
        &self,
        request: &LocateRequest<'_>,
        products_root: &Path,
        descriptors: &[PathBuf],
    ) -> Result<PathBuf, BuildError> {
        let default_plan = if descriptors.len() > 1 && self.resolver.needs_test_plans() {
            let plans = self.schemes.scheme(request.project_path, request.scheme)?;
            debug!("Scheme {} test plans: {:?}", plans.scheme, plans.test_plans);
            plans.default_test_plan
        } else {
            None
        };

        let default = self
            .resolver
            .resolve(descriptors, default_plan.as_deref())
            .ok_or_else(|| BuildError::NoArtifactsFound {
                root: products_root.to_path_buf(),
                reason: "no default xctestrun file could be selected".to_string(),
            })?;
        match &default_plan {
            Some(plan) => info!("Default xctestrun based on default test plan ({}): {}", plan, default.display()),
            None => info!("Default xctestrun: {}", default.display()),
        }
        Ok(default)
    }
}

/// Infers the single destination class the descriptors were built for.
///
/// File names without a recognizable platform token do not take part in
/// the decision; if none has one the build is assumed to target devices.
pub fn destination_platform(descriptors: &[PathBuf]) -> Result<SdkPlatform, BuildError> {
    let platforms: BTreeSet<&'static str> = descriptors
        .iter()
        .filter_map(|path| path.file_name().and_then(|n| n.to_str()))
        .filter_map(SdkPlatform::from_xctestrun_name)
        .map(|platform| platform.as_str())
        .collect();

    match platforms.len() {
        0 => Ok(SdkPlatform::IphoneOs),
        1 => Ok(platforms
            .first()
            .and_then(|name| SdkPlatform::from_name(name))
            .unwrap_or(SdkPlatform::IphoneOs)),
        _ => Err(BuildError::AmbiguousDestination {
            platforms: platforms.into_iter().map(str::to_string).collect(),
        }),
    }
}
