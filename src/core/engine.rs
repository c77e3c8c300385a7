//! Core engine wiring configuration, cache, registry and resolver together

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::CacheManager;
use crate::core::package::MANIFEST_NAME;
use crate::core::{Config, KilnError, KilnResult, Lockfile, Manifest};
use crate::registry::{HttpRegistry, MemoryRegistry, Registry};
use crate::resolver::Resolver;

/// Main engine for Kiln operations
pub struct Engine {
    /// Project root directory
    pub project_dir: PathBuf,

    /// Configuration
    pub config: Config,

    /// Package registry (HTTP or a local index file)
    pub registry: Arc<dyn Registry>,
}

impl Engine {
    /// Create a new engine for the given project directory
    pub fn new(project_dir: &Path) -> KilnResult<Self> {
        let project_dir = project_dir.canonicalize().unwrap_or_else(|_| project_dir.to_path_buf());
        let config = Config::load(&project_dir)?;

        let cache_dir = config.cache_dir()?;
        let cache = Arc::new(CacheManager::new(&cache_dir, &config.cache)?);

        let registry: Arc<dyn Registry> = match config.registry.index {
            Some(ref index) => {
                tracing::debug!("Using local index {}", index.display());
                Arc::new(MemoryRegistry::from_index_file(index)?)
            }
            None => Arc::new(HttpRegistry::new(&config.registry, cache)?),
        };

        Ok(Self {
            project_dir,
            config,
            registry,
        })
    }

    /// Check if project is initialized
    pub fn is_initialized(&self) -> bool {
        self.project_dir.join(MANIFEST_NAME).exists()
    }

    /// Get the kiln.toml for this project
    pub fn manifest(&self) -> KilnResult<Manifest> {
        Manifest::load(&self.project_dir)
    }

    /// Get the lockfile for this project
    pub fn lockfile(&self) -> KilnResult<Option<Lockfile>> {
        Lockfile::load(&self.project_dir)
    }

    /// Create a dependency resolver
    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.registry.clone(), self.config.resolver.clone())
    }

    /// Ensure project is initialized
    pub fn ensure_initialized(&self) -> KilnResult<()> {
        if !self.is_initialized() {
            return Err(KilnError::NotInitialized);
        }
        Ok(())
    }
}
