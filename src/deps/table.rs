use crate::deps::descriptor::Dependency;
use crate::error::{Result, SetupError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Table shipped with the binary
const EMBEDDED_TABLE: &str = include_str!("dependencies.json");

/// Dependency descriptors keyed by platform name, in provisioning order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DependencyTable {
    platforms: BTreeMap<String, Vec<Dependency>>,
}

impl DependencyTable {
    /// Table embedded in the binary
    pub fn embedded() -> Result<Self> {
        Self::parse(EMBEDDED_TABLE)
    }

    /// Load a table from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SetupError::Table(format!("Failed to read {}: {e}", path.display()))
        })?;

        Self::parse(&content).map_err(|e| match e {
            SetupError::Table(msg) => SetupError::Table(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Parse and validate a table from JSON text
    pub fn parse(content: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(content)
            .map_err(|e| SetupError::Table(format!("Failed to parse dependency table: {e}")))?;

        for dep in table.platforms.values().flatten() {
            dep.validate()?;
        }

        Ok(table)
    }

    /// Descriptors for a platform; a missing or empty list is an error
    pub fn for_platform(&self, platform: &str) -> Result<&[Dependency]> {
        match self.platforms.get(platform) {
            Some(deps) if !deps.is_empty() => Ok(deps),
            _ => Err(SetupError::NoDependencies {
                platform: platform.to_string(),
            }),
        }
    }

    /// Add or replace the list for a platform
    pub fn insert(&mut self, platform: impl Into<String>, deps: Vec<Dependency>) {
        self.platforms.insert(platform.into(), deps);
    }
}

/// Name of the running OS as used for table keys
#[must_use]
pub fn current_platform() -> &'static str {
    platform_name(std::env::consts::OS)
}

fn platform_name(os: &'static str) -> &'static str {
    match os {
        "windows" => "Windows",
        "linux" => "Linux",
        "macos" => "Darwin",
        "freebsd" => "FreeBSD",
        other => other,
    }
}
