//! In-memory registry backed by a local index file

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::package::Requirement;
use crate::core::{KilnError, KilnResult};
use crate::registry::types::{IndexFile, PackageIndex};
use crate::registry::Registry;

/// Registry served entirely from memory
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    packages: HashMap<String, PackageIndex>,
    /// Every (name, version) whose dependencies were requested, in order
    dep_queries: Mutex<Vec<(String, String)>>,
}

impl MemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TOML index file made of `[[package]]` tables
    pub fn from_index_file(path: &Path) -> KilnResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KilnError::registry(format!("cannot read index {}: {}", path.display(), e))
        })?;
        let index: IndexFile = toml::from_str(&content)?;

        let mut registry = Self::new();
        for package in index.packages {
            if registry.packages.contains_key(&package.name) {
                return Err(KilnError::registry(format!(
                    "package {} is listed twice in {}",
                    package.name,
                    path.display()
                )));
            }
            registry.packages.insert(package.name.clone(), package);
        }

        tracing::debug!("Loaded {} packages from {}", registry.packages.len(), path.display());
        Ok(registry)
    }

    /// Publish a version (appended after any existing ones)
    #[cfg(test)]
    pub fn publish(&mut self, name: &str, version: &str, dependencies: Vec<Requirement>) {
        self.packages
            .entry(name.to_string())
            .or_insert_with(|| PackageIndex {
                name: name.to_string(),
                versions: Vec::new(),
            })
            .versions
            .push(crate::registry::types::VersionEntry {
                version: version.to_string(),
                dependencies,
            });
    }

    /// Builder-style [`publish`](Self::publish)
    #[cfg(test)]
    pub fn with(mut self, name: &str, version: &str, dependencies: Vec<Requirement>) -> Self {
        self.publish(name, version, dependencies);
        self
    }

    /// Dependency queries served so far
    #[cfg(test)]
    pub fn dep_queries(&self) -> Vec<(String, String)> {
        self.dep_queries.lock().clone()
    }

    fn package(&self, name: &str) -> KilnResult<&PackageIndex> {
        self.packages
            .get(name)
            .ok_or_else(|| KilnError::PackageNotFound(name.to_string()))
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn list_versions(&self, name: &str) -> KilnResult<Vec<String>> {
        Ok(self.package(name)?.version_names())
    }

    async fn list_direct_deps(&self, name: &str, version: &str) -> KilnResult<Vec<Requirement>> {
        let served = {
            let mut queries = self.dep_queries.lock();
            queries.push((name.to_string(), version.to_string()));
            queries.len()
        };
        tracing::trace!("Dependency query #{}: {}@{}", served, name, version);

        let entry = self.package(name)?.entry(version).ok_or_else(|| KilnError::VersionNotFound {
            package: name.to_string(),
            interval: version.to_string(),
        })?;
        Ok(entry.dependencies.clone())
    }
}
