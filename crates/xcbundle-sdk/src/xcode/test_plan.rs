//! Skipping tests by editing an `.xctestplan` before the build.
//!
//! Test plans are JSON documents. Skipped tests live on each entry of the
//! top-level `testTargets` array:
//!
//! ```json
//! {
//!   "testTargets" : [
//!     {
//!       "skippedTests" : [ "BullsEyeSlowTests/testExample" ],
//!       "target" : { "containerPath" : "container:BullsEye.xcodeproj", "name" : "BullsEyeUITests" }
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::info;
use walkdir::WalkDir;

use crate::types::BuildError;

/// Tests to skip, grouped by test target name.
///
/// Values are `Class` or `Class/method` identifiers as they appear in a
/// test plan's `skippedTests` list.
pub type SkippedTests = BTreeMap<String, Vec<String>>;

/// Parses `Target/Class[/method]` identifiers.
///
/// Skipping a whole target (`Target`) is not supported.
pub fn parse_skip_testing(entries: &[String]) -> Result<SkippedTests, BuildError> {
    let mut skipped = SkippedTests::new();
    for entry in entries {
        let parts: Vec<&str> = entry.split('/').collect();
        match parts.as_slice() {
            [_] => {
                return Err(BuildError::TestPlan(format!(
                    "not yet supported skip testing format: {}",
                    entry
                )));
            }
            [target, rest @ ..] if rest.len() <= 2 && rest.iter().all(|p| !p.is_empty()) => {
                skipped
                    .entry(target.to_string())
                    .or_default()
                    .push(rest.join("/"));
            }
            _ => {
                return Err(BuildError::TestPlan(format!(
                    "invalid skip testing format: {}",
                    entry
                )));
            }
        }
    }
    Ok(skipped)
}

/// Finds `<name>.xctestplan` under the directory containing the project.
pub fn find_test_plan(project_path: &Path, name: &str) -> Result<Option<PathBuf>, BuildError> {
    let root = project_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = format!("{}.xctestplan", name);

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            BuildError::TestPlan(format!("failed to search for test plan {}: {}", name, e))
        })?;
        if entry.file_type().is_file() && entry.file_name() == file_name.as_str() {
            return Ok(Some(entry.into_path()));
        }
    }
    Ok(None)
}

/// Appends skipped tests to the matching `testTargets` entries of a test plan.
///
/// Entries whose target is not mentioned are left untouched.
pub fn add_skipped_tests(plan: &mut Value, skipped: &SkippedTests) -> Result<(), BuildError> {
    let targets = plan
        .as_object_mut()
        .ok_or_else(|| BuildError::TestPlan("test plan is not a JSON object".to_string()))?
        .get_mut("testTargets")
        .ok_or_else(|| BuildError::TestPlan("testTargets not found in test plan".to_string()))?
        .as_array_mut()
        .ok_or_else(|| BuildError::TestPlan("testTargets is not an array".to_string()))?;

    for item in targets.iter_mut() {
        let item = item
            .as_object_mut()
            .ok_or_else(|| BuildError::TestPlan("invalid test target format in test plan".to_string()))?;
        let name = target_name(item)?;
        let Some(to_skip) = skipped.get(&name) else {
            continue;
        };

        let list = item
            .entry("skippedTests")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| {
                BuildError::TestPlan(format!("skippedTests of {} is not an array", name))
            })?;
        list.extend(to_skip.iter().cloned().map(Value::String));
    }
    Ok(())
}

fn target_name(item: &Map<String, Value>) -> Result<String, BuildError> {
    let target = item
        .get("target")
        .ok_or_else(|| BuildError::TestPlan("target not found in test target".to_string()))?
        .as_object()
        .ok_or_else(|| BuildError::TestPlan("invalid target format in test target".to_string()))?;
    target
        .get("name")
        .ok_or_else(|| BuildError::TestPlan("name not found in test target".to_string()))?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| BuildError::TestPlan("invalid name format in test target".to_string()))
}

/// Injects `skip_testing` entries into the named test plan of a project.
///
/// Returns the path of the rewritten test plan.
pub fn skip_testing(
    project_path: &Path,
    test_plan: &str,
    entries: &[String],
) -> Result<PathBuf, BuildError> {
    let skipped = parse_skip_testing(entries)?;
    let path = find_test_plan(project_path, test_plan)?.ok_or_else(|| {
        BuildError::TestPlan(format!("test plan {} not found in project directory", test_plan))
    })?;
    info!("Found test plan at: {}", path.display());

    let content = fs::read_to_string(&path)?;
    let mut plan: Value = serde_json::from_str(&content)
        .map_err(|e| BuildError::TestPlan(format!("failed to parse {:?}: {}", path, e)))?;
    add_skipped_tests(&mut plan, &skipped)?;

    let updated = serde_json::to_string_pretty(&plan)
        .map_err(|e| BuildError::TestPlan(format!("failed to serialize test plan: {}", e)))?;
    fs::write(&path, updated)?;
    info!("Updated test plan written to: {}", path.display());
    Ok(path)
}
