//! Configuration handling for Kiln
//!
//! Supports kiln-config.toml in the project directory and environment
//! variable overrides.

use std::path::{Path, PathBuf};
use std::env;
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;

use crate::core::{KilnError, KilnResult};

/// Project-level configuration filename
pub const CONFIG_NAME: &str = "kiln-config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Registry configuration
    pub registry: RegistryConfig,

    /// Cache configuration
    pub cache: CacheConfig,

    /// Resolver configuration
    pub resolver: ResolverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Primary registry URL
    pub url: String,

    /// Local index file used instead of the HTTP registry
    pub index: Option<PathBuf>,

    /// Request timeout in seconds
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Global cache directory
    pub dir: Option<PathBuf>,

    /// Cache TTL in seconds for registry metadata
    pub metadata_ttl: u64,

    /// Enable offline mode
    pub offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum number of DPLL branching decisions (0 = unlimited)
    pub max_decisions: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "https://registry.kiln.dev/api/v1/".to_string(),
            index: None,
            timeout: 30,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            metadata_ttl: 300, // 5 minutes
            offline: false,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_decisions: 100_000,
        }
    }
}

impl Config {
    /// Load configuration from project directory and merge with defaults
    pub fn load(project_dir: &Path) -> KilnResult<Self> {
        let mut config = Config::default();

        let toml_path = project_dir.join(CONFIG_NAME);
        if toml_path.exists() {
            let content = std::fs::read_to_string(&toml_path)?;
            config = toml::from_str(&content)?;

            // Relative index paths are relative to the project, not the cwd
            if let Some(index) = config.registry.index.take() {
                config.registry.index = Some(if index.is_absolute() {
                    index
                } else {
                    project_dir.join(index)
                });
            }
        }

        config = config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(registry) = env::var("KILN_REGISTRY") {
            self.registry.url = registry;
        }

        if let Ok(index) = env::var("KILN_INDEX") {
            self.registry.index = Some(PathBuf::from(index));
        }

        if let Ok(cache_dir) = env::var("KILN_CACHE_DIR") {
            self.cache.dir = Some(PathBuf::from(cache_dir));
        }

        if let Ok(offline) = env::var("KILN_OFFLINE") {
            self.cache.offline = offline == "1" || offline.to_lowercase() == "true";
        }

        if let Ok(limit) = env::var("KILN_MAX_DECISIONS") {
            if let Ok(n) = limit.parse() {
                self.resolver.max_decisions = n;
            }
        }

        self
    }

    fn validate(&self) -> KilnResult<()> {
        if self.registry.index.is_none() {
            url::Url::parse(&self.registry.url).map_err(|e| {
                KilnError::config(format!("invalid registry url `{}`: {}", self.registry.url, e))
            })?;
        }
        if self.registry.timeout == 0 {
            return Err(KilnError::config("registry.timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Get the cache directory, creating it if necessary
    pub fn cache_dir(&self) -> KilnResult<PathBuf> {
        if let Some(ref dir) = self.cache.dir {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        let project_dirs = ProjectDirs::from("dev", "kiln", "kiln")
            .ok_or_else(|| KilnError::config("Could not determine cache directory"))?;

        let cache_dir = project_dirs.cache_dir().to_path_buf();
        std::fs::create_dir_all(&cache_dir)?;
        Ok(cache_dir)
    }
}
