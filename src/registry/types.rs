//! Registry response types

use serde::{Deserialize, Serialize};

use crate::core::package::Requirement;

/// Everything the registry publishes about one package
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageIndex {
    /// Package name
    pub name: String,

    /// Published versions, in registry order
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
}

/// A single published version
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VersionEntry {
    /// Version string
    pub version: String,

    /// Direct dependencies
    #[serde(default)]
    pub dependencies: Vec<Requirement>,
}

impl PackageIndex {
    /// Version strings in registry order
    pub fn version_names(&self) -> Vec<String> {
        self.versions.iter().map(|v| v.version.clone()).collect()
    }

    /// Look up a published version
    pub fn entry(&self, version: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.version == version)
    }
}

/// On-disk index file: a list of `[[package]]` tables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct IndexFile {
    #[serde(default, rename = "package")]
    pub packages: Vec<PackageIndex>,
}
