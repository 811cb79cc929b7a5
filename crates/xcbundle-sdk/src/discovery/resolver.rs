//! Selection of the default xctestrun file among several.

use std::path::{Path, PathBuf};

/// Picks the default descriptor among the candidates of one build.
pub trait DefaultResolver {
    /// Whether scheme test plan metadata should be read before resolving.
    fn needs_test_plans(&self) -> bool {
        true
    }

    /// Returns the default descriptor, `None` only if `candidates` is empty.
    fn resolve(&self, candidates: &[PathBuf], default_test_plan: Option<&str>) -> Option<PathBuf>;
}

/// Matches the scheme's default test plan, falling back to the first candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTestPlanResolver;

impl DefaultResolver for DefaultTestPlanResolver {
    fn resolve(&self, candidates: &[PathBuf], default_test_plan: Option<&str>) -> Option<PathBuf> {
        resolve_default(candidates, default_test_plan).map(Path::to_path_buf)
    }
}

/// Always the first candidate in discovery order.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstCandidateResolver;

impl DefaultResolver for FirstCandidateResolver {
    fn needs_test_plans(&self) -> bool {
        false
    }

    fn resolve(&self, candidates: &[PathBuf], _default_test_plan: Option<&str>) -> Option<PathBuf> {
        candidates.first().cloned()
    }
}

/// Resolves the default descriptor of a build.
///
/// With test plans xcodebuild names the files
/// `<scheme>_<test plan>_<destination>.xctestrun`, so the first candidate
/// whose file name contains `_<plan>_` wins. Without a declared default
/// plan, or when no file name matches, the first candidate is used.
pub fn resolve_default<'a>(candidates: &'a [PathBuf], default_test_plan: Option<&str>) -> Option<&'a Path> {
    let first = candidates.first()?;

    let matched = default_test_plan
        .filter(|plan| !plan.is_empty())
        .and_then(|plan| {
            let needle = format!("_{}_", plan);
            candidates.iter().find(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.contains(&needle))
            })
        });

    Some(matched.unwrap_or(first).as_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| Path::new("/tmp/test_bundle").join(name))
            .collect()
    }

    #[test]
    fn single_candidate_is_default() {
        let paths = candidates(&["BullsEye_iphonesimulator15.5-arm64.xctestrun"]);
        assert_eq!(resolve_default(&paths, Some("FullTests")), Some(paths[0].as_path()));
        assert_eq!(resolve_default(&paths, None), Some(paths[0].as_path()));
    }

    #[test]
    fn default_plan_wins_regardless_of_order() {
        let names = [
            "BullsEye_UnitTests_iphonesimulator15.5-arm64.xctestrun",
            "BullsEye_FullTests_iphonesimulator15.5-arm64.xctestrun",
            "BullsEye_UITests_iphonesimulator15.5-arm64.xctestrun",
        ];
        let paths = candidates(&names);
        let mut reversed = paths.clone();
        reversed.reverse();

        for order in [&paths, &reversed] {
            let default = resolve_default(order, Some("FullTests")).unwrap();
            assert!(default.ends_with(names[1]));
        }
    }

    #[test]
    fn plan_name_must_be_a_whole_segment() {
        // "Tests" is contained in every name but never as `_Tests_`
        let paths = candidates(&[
            "BullsEye_UnitTests_iphonesimulator15.5-arm64.xctestrun",
            "BullsEye_FullTests_iphonesimulator15.5-arm64.xctestrun",
        ]);
        assert_eq!(resolve_default(&paths, Some("Tests")), Some(paths[0].as_path()));
    }

    #[test]
    fn falls_back_to_first_discovered() {
        // discovery order, not alphabetical order, decides the fallback
        let paths = candidates(&[
            "BullsEye_UITests_iphonesimulator15.5-arm64.xctestrun",
            "BullsEye_UnitTests_iphonesimulator15.5-arm64.xctestrun",
        ]);
        assert_eq!(resolve_default(&paths, Some("Missing")), Some(paths[0].as_path()));
        assert_eq!(resolve_default(&paths, None), Some(paths[0].as_path()));
        assert_eq!(resolve_default(&paths, Some("")), Some(paths[0].as_path()));
    }

    #[test]
    fn no_candidates() {
        assert_eq!(resolve_default(&[], Some("FullTests")), None);
        assert_eq!(FirstCandidateResolver.resolve(&[], None), None);
    }

    #[test]
    fn first_candidate_strategy_ignores_plans() {
        let paths = candidates(&[
            "BullsEye_UnitTests_iphonesimulator15.5-arm64.xctestrun",
            "BullsEye_FullTests_iphonesimulator15.5-arm64.xctestrun",
        ]);
        assert!(!FirstCandidateResolver.needs_test_plans());
        assert_eq!(FirstCandidateResolver.resolve(&paths, Some("FullTests")), Some(paths[0].clone()));
        assert_eq!(DefaultTestPlanResolver.resolve(&paths, Some("FullTests")), Some(paths[1].clone()));
    }
}
