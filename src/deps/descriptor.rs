use crate::error::{Result, SetupError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A third-party dependency: where to fetch it, how to tell it is already
/// present, and what to do with the fetched file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub check: CheckSpec,
    #[serde(default)]
    pub after: AfterSpec,
}

/// Raw readiness predicate as written in the table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<String>,
}

/// Raw post-fetch action as written in the table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AfterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_to: Option<String>,
}

/// How to decide whether a dependency is already satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness<'a> {
    /// Run a command; exit status zero means satisfied
    Command(&'a str),
    /// Satisfied when the path exists
    PathExists(&'a Path),
    /// No predicate given, always provision
    Unspecified,
}

/// What to do once the artifact is fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction<'a> {
    Exec(&'a str),
    ExtractTo(&'a Path),
    None,
}

impl Dependency {
    /// Readiness predicate; `cmd` wins over `exists` when both are set.
    /// Blank fields count as unset.
    #[must_use]
    pub fn readiness(&self) -> Readiness<'_> {
        match (non_blank(&self.check.cmd), non_blank(&self.check.exists)) {
            (Some(cmd), _) => Readiness::Command(cmd),
            (None, Some(path)) => Readiness::PathExists(Path::new(path)),
            (None, None) => Readiness::Unspecified,
        }
    }

    /// Post-fetch action; `exec` wins over `extract_to` when both are set.
    /// Blank fields count as unset.
    #[must_use]
    pub fn post_action(&self) -> PostAction<'_> {
        match (non_blank(&self.after.exec), non_blank(&self.after.extract_to)) {
            (Some(cmd), _) => PostAction::Exec(cmd),
            (None, Some(dir)) => PostAction::ExtractTo(Path::new(dir)),
            (None, None) => PostAction::None,
        }
    }

    /// Local file name of the artifact, the last path segment of the URL
    pub fn artifact_name(&self) -> Result<&str> {
        artifact_file_name(&self.url).ok_or_else(|| {
            SetupError::Table(format!(
                "'{}': cannot derive a file name from URL '{}'",
                self.name, self.url
            ))
        })
    }

    /// Reject descriptors the provisioner could not act on
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SetupError::Table(format!(
                "dependency for '{}' has an empty name",
                self.url
            )));
        }
        if self.url.trim().is_empty() {
            return Err(SetupError::Table(format!("'{}' has an empty URL", self.name)));
        }
        self.artifact_name()?;
        Ok(())
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.trim().is_empty())
}

/// Final path segment of a URL, ignoring query and fragment
fn artifact_file_name(url: &str) -> Option<&str> {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    let path = &url[..end];
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    // Host only, no path
    let (_, path) = path.split_once('/')?;

    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
}
