// SPDX-License-Identifier: MIT OR Apache-2.0
//! Launch specification types.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Immutable description of a process to launch.
///
/// Identity (equality and hashing) considers only the executable and its
/// arguments; the working directory and environment override are launch
/// context, not identity.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    executable: PathBuf,
    arguments: Vec<String>,
    working_directory: Option<PathBuf>,
    environment: Option<BTreeMap<String, String>>,
}

impl TaskSpec {
    /// Create a spec for the given executable with no arguments, the
    /// inherited working directory, and the inherited environment.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            arguments: Vec::new(),
            working_directory: None,
            environment: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    /// Append several arguments, preserving order.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the child in `dir` instead of the parent's working directory.
    #[must_use]
    pub fn working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Replace the child's environment wholesale.
    ///
    /// When unset the child inherits the parent environment; when set the
    /// child sees exactly this mapping and nothing else.
    #[must_use]
    pub fn environment(mut self, env: BTreeMap<String, String>) -> Self {
        self.environment = Some(env);
        self
    }

    /// Path of the executable to launch.
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Arguments passed to the executable, in order.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Working directory override, if any.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// Environment override, if any (`None` = inherit).
    pub fn env_override(&self) -> Option<&BTreeMap<String, String>> {
        self.environment.as_ref()
    }
}

/// Renders as the command line would read: executable followed by each
/// argument, space-separated. Used verbatim inside error diagnostics.
impl fmt::Display for TaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.executable.display())?;
        for arg in &self.arguments {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

impl PartialEq for TaskSpec {
    fn eq(&self, other: &Self) -> bool {
        self.executable == other.executable && self.arguments == other.arguments
    }
}

impl Eq for TaskSpec {}

impl Hash for TaskSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.executable.hash(state);
        self.arguments.hash(state);
    }
}
