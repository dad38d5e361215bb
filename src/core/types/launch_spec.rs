//! Description of the program to launch

use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable description of what to run.
///
/// The executable path and argument string are joined into one command line
/// exactly as supplied; no quoting or escaping is applied, so the caller is
/// responsible for producing a valid Windows command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    path: String,
    #[serde(default)]
    arguments: String,
    #[serde(default)]
    working_directory: Option<String>,
}

impl LaunchSpec {
    /// Create a spec for `path` with no arguments, inheriting the working directory
    pub fn new(path: impl Into<String>) -> Self {
        LaunchSpec {
            path: path.into(),
            arguments: String::new(),
            working_directory: None,
        }
    }

    /// Set the raw argument string
    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.arguments = arguments.into();
        self
    }

    /// Set the working directory; an empty string means "inherit"
    pub fn with_working_directory(mut self, dir: impl Into<String>) -> Self {
        let dir = dir.into();
        self.working_directory = (!dir.is_empty()).then_some(dir);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn arguments(&self) -> &str {
        &self.arguments
    }

    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    /// The command line handed to the OS: `"{path} {arguments}"`
    pub fn command_line(&self) -> String {
        format!("{} {}", self.path, self.arguments)
    }
}

impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.working_directory {
            Some(dir) => write!(f, "{} (in {})", self.command_line().trim_end(), dir),
            None => write!(f, "{}", self.command_line().trim_end()),
        }
    }
}
