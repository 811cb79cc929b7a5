//! Scheme and test plan metadata read from `.xcscheme` files.
//!
//! Schemes are looked up the way Xcode lists them: shared schemes in
//! `xcshareddata/xcschemes`, then user schemes in
//! `xcuserdata/<user>.xcuserdatad/xcschemes`. For a workspace the
//! workspace itself is searched first, then every project referenced from
//! its `contents.xcworkspacedata`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::builders::common::is_workspace;
use crate::types::{BuildError, SchemeTestPlans};

/// Reads test plan metadata of a scheme.
pub trait SchemeReader {
    fn scheme(&self, project_path: &Path, scheme: &str) -> Result<SchemeTestPlans, BuildError>;
}

impl<T: SchemeReader + ?Sized> SchemeReader for &T {
    fn scheme(&self, project_path: &Path, scheme: &str) -> Result<SchemeTestPlans, BuildError> {
        (**self).scheme(project_path, scheme)
    }
}

/// [`SchemeReader`] that parses the scheme files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct XcschemeReader;

impl SchemeReader for XcschemeReader {
    fn scheme(&self, project_path: &Path, scheme: &str) -> Result<SchemeTestPlans, BuildError> {
        let path = find_scheme_file(project_path, scheme)?.ok_or_else(|| {
            BuildError::MetadataRead(format!(
                "scheme {} not found in {:?}. Make sure the scheme is marked as shared",
                scheme, project_path
            ))
        })?;
        debug!("Reading scheme {:?}", path);

        let content = fs::read_to_string(&path).map_err(|e| {
            BuildError::MetadataRead(format!("failed to read scheme {:?}: {}", path, e))
        })?;
        parse_scheme(scheme, &content)
    }
}

#[derive(Debug, Deserialize)]
struct SchemeDoc {
    #[serde(rename = "TestAction")]
    test_action: Option<TestAction>,
}

#[derive(Debug, Deserialize)]
struct TestAction {
    #[serde(rename = "TestPlans")]
    test_plans: Option<TestPlans>,
}

#[derive(Debug, Deserialize)]
struct TestPlans {
    #[serde(rename = "TestPlanReference", default)]
    references: Vec<TestPlanReference>,
}

#[derive(Debug, Deserialize)]
struct TestPlanReference {
    #[serde(rename = "@reference")]
    reference: String,
    #[serde(rename = "@default")]
    default: Option<String>,
}

impl TestPlanReference {
    /// `container:Tests/FullTests.xctestplan` -> `FullTests`
    fn plan_name(&self) -> Option<String> {
        let location = self
            .reference
            .split_once(':')
            .map(|(_, path)| path)
            .unwrap_or(&self.reference);
        Path::new(location)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string)
    }

    fn is_default(&self) -> bool {
        self.default.as_deref() == Some("YES")
    }
}

/// Parses the test plans referenced by a scheme document.
pub fn parse_scheme(name: &str, content: &str) -> Result<SchemeTestPlans, BuildError> {
    let doc: SchemeDoc = quick_xml::de::from_str(content).map_err(|e| {
        BuildError::MetadataRead(format!("failed to parse scheme {}: {}", name, e))
    })?;

    let references = doc
        .test_action
        .and_then(|action| action.test_plans)
        .map(|plans| plans.references)
        .unwrap_or_default();

    let mut plans = SchemeTestPlans {
        scheme: name.to_string(),
        ..Default::default()
    };
    for reference in &references {
        let Some(plan) = reference.plan_name() else {
            continue;
        };
        if reference.is_default() && plans.default_test_plan.is_none() {
            plans.default_test_plan = Some(plan.clone());
        }
        plans.test_plans.push(plan);
    }
    Ok(plans)
}

/// Finds `<scheme>.xcscheme` belonging to a project or workspace.
pub fn find_scheme_file(project_path: &Path, scheme: &str) -> Result<Option<PathBuf>, BuildError> {
    if let Some(found) = find_scheme_in_container(project_path, scheme)? {
        return Ok(Some(found));
    }
    if !is_workspace(project_path) {
        return Ok(None);
    }

    for project in workspace_projects(project_path)? {
        if let Some(found) = find_scheme_in_container(&project, scheme)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn find_scheme_in_container(container: &Path, scheme: &str) -> Result<Option<PathBuf>, BuildError> {
    let file_name = format!("{}.xcscheme", scheme);

    let shared = container
        .join("xcshareddata")
        .join("xcschemes")
        .join(&file_name);
    if shared.is_file() {
        return Ok(Some(shared));
    }

    let pattern = container
        .join("xcuserdata")
        .join("*.xcuserdatad")
        .join("xcschemes")
        .join(&file_name);
    let pattern = pattern.to_string_lossy();
    let mut user_schemes: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| BuildError::MetadataRead(format!("invalid scheme pattern {}: {}", pattern, e)))?
        .filter_map(Result::ok)
        .collect();
    user_schemes.sort();
    Ok(user_schemes.into_iter().next())
}

#[derive(Debug, Deserialize)]
struct WorkspaceDoc {
    #[serde(rename = "$value", default)]
    items: Vec<WorkspaceItem>,
}

#[derive(Debug, Deserialize)]
enum WorkspaceItem {
    FileRef {
        #[serde(rename = "@location")]
        location: String,
    },
    Group {
        #[serde(rename = "@location", default)]
        location: String,
        #[serde(rename = "$value", default)]
        items: Vec<WorkspaceItem>,
    },
}

/// Projects referenced from a workspace's `contents.xcworkspacedata`.
pub fn workspace_projects(workspace: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let contents_path = workspace.join("contents.xcworkspacedata");
    let content = fs::read_to_string(&contents_path).map_err(|e| {
        BuildError::MetadataRead(format!("failed to read {:?}: {}", contents_path, e))
    })?;
    let doc: WorkspaceDoc = quick_xml::de::from_str(&content).map_err(|e| {
        BuildError::MetadataRead(format!("failed to parse {:?}: {}", contents_path, e))
    })?;

    let workspace_dir = workspace.parent().unwrap_or_else(|| Path::new("."));
    let mut projects = Vec::new();
    collect_projects(&doc.items, workspace_dir, workspace_dir, &mut projects);
    Ok(projects)
}

fn collect_projects(items: &[WorkspaceItem], group_dir: &Path, workspace_dir: &Path, out: &mut Vec<PathBuf>) {
    for item in items {
        match item {
            WorkspaceItem::FileRef { location } => {
                let Some(path) = resolve_location(location, group_dir, workspace_dir) else {
                    continue;
                };
                if path.extension().and_then(|e| e.to_str()) == Some("xcodeproj") {
                    out.push(path);
                }
            }
            WorkspaceItem::Group { location, items } => {
                let dir = resolve_location(location, group_dir, workspace_dir)
                    .unwrap_or_else(|| group_dir.to_path_buf());
                collect_projects(items, &dir, workspace_dir, out);
            }
        }
    }
}

fn resolve_location(location: &str, group_dir: &Path, workspace_dir: &Path) -> Option<PathBuf> {
    let (kind, path) = location.split_once(':')?;
    match kind {
        "group" => Some(group_dir.join(path)),
        "container" => Some(workspace_dir.join(path)),
        "absolute" => Some(PathBuf::from(path)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SCHEME: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Scheme LastUpgradeVersion = "1340" version = "1.7">
   <BuildAction parallelizeBuildables = "YES" buildImplicitDependencies = "YES">
   </BuildAction>
   <TestAction buildConfiguration = "Debug" selectedDebuggerIdentifier = "Xcode.DebuggerFoundation.Debugger.LLDB">
      <TestPlans>
         <TestPlanReference reference = "container:UnitTests.xctestplan">
         </TestPlanReference>
         <TestPlanReference reference = "container:Plans/FullTests.xctestplan" default = "YES">
         </TestPlanReference>
         <TestPlanReference reference = "container:UITests.xctestplan">
         </TestPlanReference>
      </TestPlans>
   </TestAction>
   <LaunchAction buildConfiguration = "Debug">
   </LaunchAction>
</Scheme>
"#;

    #[test]
    fn parses_test_plans_and_default() {
        let plans = parse_scheme("BullsEye", SCHEME).unwrap();
        assert_eq!(plans.scheme, "BullsEye");
        assert_eq!(plans.default_test_plan.as_deref(), Some("FullTests"));
        assert_eq!(plans.test_plans, vec!["UnitTests", "FullTests", "UITests"]);
    }

    #[test]
    fn scheme_without_test_plans() {
        let content = r#"<Scheme version = "1.3"><TestAction buildConfiguration = "Debug"></TestAction></Scheme>"#;
        let plans = parse_scheme("App", content).unwrap();
        assert_eq!(plans.default_test_plan, None);
        assert!(plans.test_plans.is_empty());
    }

    #[test]
    fn malformed_scheme_is_metadata_error() {
        let err = parse_scheme("App", "<Scheme><TestAction></Scheme>").unwrap_err();
        assert!(matches!(err, BuildError::MetadataRead(_)));
    }

    fn write_scheme(container: &Path, dir: &str, name: &str) -> PathBuf {
        let schemes = container.join(dir);
        fs::create_dir_all(&schemes).unwrap();
        let path = schemes.join(format!("{}.xcscheme", name));
        fs::write(&path, SCHEME).unwrap();
        path
    }

    #[test]
    fn finds_shared_and_user_schemes() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("BullsEye.xcodeproj");
        let user = write_scheme(&project, "xcuserdata/ci.xcuserdatad/xcschemes", "Local");
        let shared = write_scheme(&project, "xcshareddata/xcschemes", "BullsEye");

        assert_eq!(find_scheme_file(&project, "BullsEye").unwrap(), Some(shared));
        assert_eq!(find_scheme_file(&project, "Local").unwrap(), Some(user));
        assert_eq!(find_scheme_file(&project, "Missing").unwrap(), None);
    }

    #[test]
    fn finds_scheme_in_workspace_project() {
        let dir = TempDir::new().unwrap();
        let workspace = dir.path().join("App.xcworkspace");
        fs::create_dir_all(&workspace).unwrap();
        fs::write(
            workspace.join("contents.xcworkspacedata"),
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Workspace version = "1.0">
   <FileRef location = "group:Pods/Pods.xcodeproj">
   </FileRef>
   <Group location = "container:Apps" name = "Apps">
      <FileRef location = "group:BullsEye.xcodeproj">
      </FileRef>
   </Group>
</Workspace>
"#,
        )
        .unwrap();
        let project = dir.path().join("Apps").join("BullsEye.xcodeproj");
        let scheme = write_scheme(&project, "xcshareddata/xcschemes", "BullsEye");

        let projects = workspace_projects(&workspace).unwrap();
        assert_eq!(projects, vec![dir.path().join("Pods/Pods.xcodeproj"), project]);
        assert_eq!(find_scheme_file(&workspace, "BullsEye").unwrap(), Some(scheme));

        let plans = XcschemeReader.scheme(&workspace, "BullsEye").unwrap();
        assert_eq!(plans.default_test_plan.as_deref(), Some("FullTests"));
    }

    #[test]
    fn missing_scheme_is_metadata_error() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("App.xcodeproj");
        fs::create_dir_all(&project).unwrap();
        assert!(matches!(
            XcschemeReader.scheme(&project, "App"),
            Err(BuildError::MetadataRead(_))
        ));
    }
}
