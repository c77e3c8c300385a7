//! Lockfile handling for Kiln
//!
//! The lockfile records the resolution table, one entry per package name,
//! sorted and sealed with a content hash.

use std::path::Path;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Digest};

use crate::core::package::Source;
use crate::core::{KilnError, KilnResult};
use crate::resolver::Resolved;

/// Lockfile version
pub const LOCKFILE_VERSION: u32 = 1;

/// Lockfile filename
pub const LOCKFILE_NAME: &str = "kiln.lock";

/// Main lockfile structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    /// Lockfile format version
    pub version: u32,

    /// Integrity hash of the lockfile content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,

    /// Resolved packages
    #[serde(default, rename = "package")]
    pub packages: Vec<LockedPackage>,
}

/// A package as pinned by the resolver
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockedPackage {
    /// Package name
    pub name: String,

    /// Resolved version, or the verbatim tag for non-primary sources
    pub version: String,

    /// Where the package comes from
    #[serde(default)]
    pub source: Source,

    /// Names of direct dependencies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl Default for Lockfile {
    fn default() -> Self {
        Self {
            version: LOCKFILE_VERSION,
            integrity: None,
            packages: Vec::new(),
        }
    }
}

impl Lockfile {
    /// Build a lockfile from a resolution
    pub fn from_resolved(resolved: &Resolved) -> Self {
        let packages = resolved
            .backtracked
            .iter()
            .map(|(name, package)| LockedPackage {
                name: name.clone(),
                version: package.version.clone(),
                source: package.source.clone(),
                dependencies: package.dependencies.clone(),
            })
            .collect();

        Self {
            packages,
            ..Self::default()
        }
    }

    /// Load lockfile from a directory
    pub fn load(dir: &Path) -> KilnResult<Option<Self>> {
        let path = dir.join(LOCKFILE_NAME);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let lockfile: Lockfile = toml::from_str(&content)?;

        if lockfile.version != LOCKFILE_VERSION {
            return Err(KilnError::InvalidLockfile);
        }

        // Verify integrity if present
        if let Some(ref stored_integrity) = lockfile.integrity {
            let computed = lockfile.compute_integrity()?;
            if computed != *stored_integrity {
                return Err(KilnError::InvalidLockfile);
            }
        }

        Ok(Some(lockfile))
    }

    /// Save lockfile to a directory
    pub fn save(&mut self, dir: &Path) -> KilnResult<()> {
        // Sort packages for deterministic output
        self.packages.sort_by(|a, b| a.name.cmp(&b.name));

        self.integrity = None;
        self.integrity = Some(self.compute_integrity()?);

        let path = dir.join(LOCKFILE_NAME);
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!("Wrote {} packages to {}", self.packages.len(), LOCKFILE_NAME);
        Ok(())
    }

    /// Compute integrity hash of lockfile content
    fn compute_integrity(&self) -> KilnResult<String> {
        let mut unsealed = self.clone();
        unsealed.integrity = None;

        let content = toml::to_string(&unsealed)?;
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Ok(format!("sha256-{}", hex::encode(hasher.finalize())))
    }

    /// Find a package by name
    pub fn find_package(&self, name: &str) -> Option<&LockedPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Compute what changes going from this lockfile to `other`
    pub fn diff(&self, other: &Lockfile) -> LockfileDiff {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut changed = Vec::new();

        for pkg in &other.packages {
            match self.find_package(&pkg.name) {
                None => added.push(pkg.clone()),
                Some(existing) if existing != pkg => changed.push(pkg.clone()),
                _ => {}
            }
        }

        for pkg in &self.packages {
            if other.find_package(&pkg.name).is_none() {
                removed.push(pkg.clone());
            }
        }

        LockfileDiff {
            added,
            removed,
            changed,
        }
    }
}

/// Diff between two lockfiles
#[derive(Debug, Clone, Serialize)]
pub struct LockfileDiff {
    pub added: Vec<LockedPackage>,
    pub removed: Vec<LockedPackage>,
    pub changed: Vec<LockedPackage>,
}

impl LockfileDiff {
    /// Check if there are any changes
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Get total number of changes
    pub fn total_changes(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolvedPackage;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn locked(name: &str, version: &str) -> LockedPackage {
        LockedPackage {
            name: name.to_string(),
            version: version.to_string(),
            source: Source::Primary,
            dependencies: vec![],
        }
    }

    #[test]
    fn test_lockfile_roundtrip() {
        let dir = tempdir().unwrap();

        let mut lockfile = Lockfile::default();
        lockfile.packages.push(locked("zlib", "1.2.11"));
        lockfile.packages.push(LockedPackage {
            dependencies: vec!["zlib".to_string()],
            ..locked("fmt", "7.1.3")
        });
        lockfile.packages.push(LockedPackage {
            source: Source::Other("github".to_string()),
            ..locked("spdlog", "v1.8.0")
        });

        lockfile.save(dir.path()).unwrap();

        let loaded = Lockfile::load(dir.path()).unwrap().unwrap();
        let names: Vec<&str> = loaded.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["fmt", "spdlog", "zlib"]);
        assert_eq!(loaded.find_package("fmt").unwrap().dependencies, vec!["zlib"]);
        assert_eq!(
            loaded.find_package("spdlog").unwrap().source,
            Source::Other("github".to_string())
        );
        assert!(loaded.integrity.unwrap().starts_with("sha256-"));
    }

    #[test]
    fn test_lockfile_integrity() {
        let dir = tempdir().unwrap();

        let mut lockfile = Lockfile::default();
        lockfile.packages.push(locked("test", "1.0.0"));
        lockfile.save(dir.path()).unwrap();

        // Tamper with the lockfile
        let path = dir.path().join(LOCKFILE_NAME);
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("1.0.0", "2.0.0")).unwrap();

        assert!(matches!(Lockfile::load(dir.path()), Err(KilnError::InvalidLockfile)));
    }

    #[test]
    fn test_missing_lockfile() {
        let dir = tempdir().unwrap();
        assert!(Lockfile::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_from_resolved() {
        let mut backtracked = BTreeMap::new();
        backtracked.insert(
            "app".to_string(),
            ResolvedPackage {
                version: "1.0.0".to_string(),
                source: Source::Primary,
                dependencies: vec!["lib".to_string()],
            },
        );
        backtracked.insert(
            "lib".to_string(),
            ResolvedPackage {
                version: "1.5.0".to_string(),
                source: Source::Primary,
                dependencies: vec![],
            },
        );
        let resolved = Resolved {
            activated: vec![],
            backtracked,
            decisions: None,
        };

        let lockfile = Lockfile::from_resolved(&resolved);
        assert_eq!(lockfile.packages.len(), 2);
        assert_eq!(lockfile.find_package("lib").unwrap().version, "1.5.0");
        assert_eq!(lockfile.find_package("app").unwrap().dependencies, vec!["lib"]);
    }

    #[test]
    fn test_diff() {
        let mut old = Lockfile::default();
        old.packages = vec![locked("fmt", "6.0.0"), locked("zlib", "1.2.11")];
        let mut new = Lockfile::default();
        new.packages = vec![locked("fmt", "7.1.3"), locked("json", "3.9.1")];

        let diff = old.diff(&new);
        assert_eq!(diff.added, vec![locked("json", "3.9.1")]);
        assert_eq!(diff.removed, vec![locked("zlib", "1.2.11")]);
        assert_eq!(diff.changed, vec![locked("fmt", "7.1.3")]);
        assert_eq!(diff.total_changes(), 3);
        assert!(old.diff(&old).is_empty());
    }
}
