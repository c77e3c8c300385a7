//! Package types and kiln.toml handling

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::core::{KilnError, KilnResult};

/// Manifest filename
pub const MANIFEST_NAME: &str = "kiln.toml";

/// Where a package comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    /// The configured package registry
    #[default]
    Primary,
    /// Any other source (e.g. `github`), identified by its tag
    Other(String),
}

impl Source {
    pub fn is_primary(&self) -> bool {
        matches!(self, Source::Primary)
    }
}

impl From<String> for Source {
    fn from(tag: String) -> Self {
        if tag.is_empty() || tag == "primary" {
            Source::Primary
        } else {
            Source::Other(tag)
        }
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.to_string()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Primary => write!(f, "primary"),
            Source::Other(tag) => write!(f, "{}", tag),
        }
    }
}

/// A declared dependency: name, version interval and source
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,

    /// Interval expression, or a ref/tag for non-primary sources
    #[serde(alias = "version")]
    pub interval: String,

    #[serde(default)]
    pub source: Source,
}

impl Requirement {
    pub fn new<N: Into<String>, I: Into<String>>(name: N, interval: I, source: Source) -> Self {
        Self {
            name: name.into(),
            interval: interval.into(),
            source,
        }
    }

    /// Shorthand for a primary-registry requirement
    pub fn primary<N: Into<String>, I: Into<String>>(name: N, interval: I) -> Self {
        Self::new(name, interval, Source::Primary)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Source::Primary => write!(f, "{} {}", self.name, self.interval),
            Source::Other(ref tag) => write!(f, "{} {} ({})", self.name, self.interval, tag),
        }
    }
}

/// kiln.toml structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub package: PackageInfo,

    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,
}

/// A dependency entry as written in kiln.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    /// `fmt = ">=7.0.0 and <8.0.0"`
    Interval(String),
    /// `spdlog = { interval = "v1.8.0", source = "github" }`
    Detailed {
        #[serde(alias = "version")]
        interval: String,
        #[serde(default)]
        source: Source,
    },
}

fn default_version() -> String {
    "0.1.0".to_string()
}

impl Manifest {
    /// Load kiln.toml from a directory
    pub fn load(dir: &Path) -> KilnResult<Self> {
        let path = dir.join(MANIFEST_NAME);
        if !path.exists() {
            return Err(KilnError::NotInitialized);
        }

        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| KilnError::InvalidManifest {
            path,
            reason: e.to_string(),
        })
    }

    /// Declared dependencies as requirements, in name order
    pub fn requirements(&self) -> Vec<Requirement> {
        self.dependencies
            .iter()
            .map(|(name, spec)| match spec {
                DependencySpec::Interval(interval) => Requirement::primary(name, interval),
                DependencySpec::Detailed { interval, source } => {
                    Requirement::new(name, interval, source.clone())
                }
            })
            .collect()
    }
}
