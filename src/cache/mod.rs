//! On-disk cache of registry metadata

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::core::config::CacheConfig;
use crate::core::{KilnError, KilnResult};

/// Cache manager for registry documents
pub struct CacheManager {
    /// Cache root directory
    cache_dir: PathBuf,

    /// Configuration
    config: CacheConfig,
}

impl CacheManager {
    /// Create a new cache manager
    pub fn new(cache_dir: &Path, config: &CacheConfig) -> KilnResult<Self> {
        let cache_dir = cache_dir.to_path_buf();
        std::fs::create_dir_all(cache_dir.join("metadata"))?;

        Ok(Self {
            cache_dir,
            config: config.clone(),
        })
    }

    fn metadata_path(&self, name: &str) -> PathBuf {
        let safe_name = name.replace('/', "+").replace('\\', "+").replace('@', "");
        self.cache_dir.join("metadata").join(format!("{}.json", safe_name))
    }

    /// Get cached metadata for a package.
    ///
    /// Expired entries are ignored unless offline mode is on.
    pub fn get_metadata(&self, name: &str) -> KilnResult<Option<CachedMetadata>> {
        let metadata_path = self.metadata_path(name);
        if !metadata_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&metadata_path)?;
        let cached: CachedMetadata = match serde_json::from_str(&content) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("Ignoring corrupt cache entry {}: {}", metadata_path.display(), e);
                return Ok(None);
            }
        };

        let age = Utc::now().timestamp() - cached.cached_at;
        if age > self.config.metadata_ttl as i64 && !self.config.offline {
            tracing::debug!("Cached metadata for {} expired ({}s old)", name, age);
            return Ok(None);
        }

        Ok(Some(cached))
    }

    /// Store metadata for a package
    pub fn store_metadata(&self, name: &str, data: &str) -> KilnResult<()> {
        let cached = CachedMetadata {
            data: data.to_string(),
            cached_at: Utc::now().timestamp(),
        };

        let content = serde_json::to_string(&cached)?;
        std::fs::write(self.metadata_path(name), content)?;

        Ok(())
    }

    /// Clear the entire cache
    pub fn clear(&self) -> KilnResult<()> {
        if self.cache_dir.exists() {
            std::fs::remove_dir_all(&self.cache_dir)
                .map_err(|e| KilnError::cache(format!("cannot clear {}: {}", self.cache_dir.display(), e)))?;
            std::fs::create_dir_all(self.cache_dir.join("metadata"))?;
        }
        Ok(())
    }

    /// Get cache statistics
    pub fn stats(&self) -> KilnResult<CacheStats> {
        let mut total_size = 0u64;
        let mut entry_count = 0usize;

        for entry in walkdir::WalkDir::new(self.cache_dir.join("metadata")).min_depth(1) {
            let entry = entry.map_err(|e| KilnError::cache(e.to_string()))?;
            if entry.file_type().is_file() {
                entry_count += 1;
                total_size += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        Ok(CacheStats {
            path: self.cache_dir.clone(),
            total_size,
            entry_count,
        })
    }

    /// Check if offline mode is enabled
    pub fn is_offline(&self) -> bool {
        self.config.offline
    }
}

/// Cached metadata entry
#[derive(Debug, Serialize, Deserialize)]
pub struct CachedMetadata {
    pub data: String,
    /// Unix timestamp (seconds)
    pub cached_at: i64,
}

/// Cache statistics
#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub path: PathBuf,
    pub total_size: u64,
    pub entry_count: usize,
}
