//! `xcodebuild` command line construction.

use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use crate::builders::common::is_workspace;
use crate::codesign::AuthParams;
use crate::types::BuildInvocation;

/// The action run by the build step.
pub const BUILD_FOR_TESTING: &str = "build-for-testing";

/// A fully specified external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Converts into a [`Command`] ready to be spawned.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Shell-quoted command line for logs.
    pub fn printable(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.printable())
    }
}

/// Builder of an `xcodebuild` invocation.
///
/// Arguments are emitted in a fixed order: project or workspace, scheme,
/// configuration, destination, test plan, xcconfig, authentication, the
/// action and finally the custom options.
#[derive(Debug, Clone)]
pub struct XcodebuildCommand {
    project_path: PathBuf,
    action: String,
    scheme: Option<String>,
    configuration: Option<String>,
    destination: Option<String>,
    test_plan: Option<String>,
    xcconfig_path: Option<PathBuf>,
    auth: Option<AuthParams>,
    options: Vec<String>,
}

impl XcodebuildCommand {
    pub fn new(project_path: impl Into<PathBuf>, action: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            action: action.into(),
            scheme: None,
            configuration: None,
            destination: None,
            test_plan: None,
            xcconfig_path: None,
            auth: None,
            options: Vec::new(),
        }
    }

    /// `build-for-testing` command for an invocation, without xcconfig.
    pub fn build_for_testing(invocation: &BuildInvocation) -> Self {
        let mut cmd = Self::new(&invocation.project_path, BUILD_FOR_TESTING)
            .scheme(&invocation.scheme)
            .destination(&invocation.destination)
            .options(invocation.options.iter().cloned());
        cmd.configuration = invocation.configuration.clone();
        cmd.test_plan = invocation.test_plan.clone();
        cmd.auth = invocation.auth.clone();
        cmd
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }

    pub fn destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn test_plan(mut self, test_plan: impl Into<String>) -> Self {
        self.test_plan = Some(test_plan.into());
        self
    }

    pub fn xcconfig_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.xcconfig_path = Some(path.into());
        self
    }

    pub fn auth(mut self, auth: AuthParams) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn options<I: IntoIterator<Item = String>>(mut self, options: I) -> Self {
        self.options.extend(options);
        self
    }

    /// Argument vector, excluding the `xcodebuild` program itself.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();

        let project_flag = if is_workspace(&self.project_path) {
            "-workspace"
        } else {
            "-project"
        };
        args.push(project_flag.to_string());
        args.push(self.project_path.display().to_string());

        let mut push_flag = |flag: &str, value: Option<&str>| {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                args.push(flag.to_string());
                args.push(value.to_string());
            }
        };
        push_flag("-scheme", self.scheme.as_deref());
        push_flag("-configuration", self.configuration.as_deref());
        push_flag("-destination", self.destination.as_deref());
        push_flag("-testPlan", self.test_plan.as_deref());

        if let Some(path) = &self.xcconfig_path {
            args.push("-xcconfig".to_string());
            args.push(path.display().to_string());
        }
        if let Some(auth) = &self.auth {
            args.extend(auth.args());
        }

        args.push(self.action.clone());
        args.extend(self.options.iter().cloned());
        args
    }

    pub fn to_spec(&self) -> CommandSpec {
        CommandSpec::new("xcodebuild").args(self.args())
    }
}
