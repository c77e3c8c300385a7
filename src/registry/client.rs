//! Registry HTTP client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use url::Url;

use crate::cache::CacheManager;
use crate::core::config::RegistryConfig;
use crate::core::package::Requirement;
use crate::core::{KilnError, KilnResult};
use crate::registry::types::PackageIndex;
use crate::registry::Registry;

/// HTTP registry client
pub struct HttpRegistry {
    /// HTTP client
    client: reqwest::Client,
    /// Registry base URL (always ends with `/`)
    base: Url,
    /// On-disk metadata cache
    cache: Arc<CacheManager>,
    /// Documents already fetched during this process
    fetched: DashMap<String, Arc<PackageIndex>>,
}

impl HttpRegistry {
    /// Create a new registry client
    pub fn new(config: &RegistryConfig, cache: Arc<CacheManager>) -> KilnResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let agent = format!("kiln/{}", env!("CARGO_PKG_VERSION"));
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_str(&agent)
                .map_err(|e| KilnError::other(e.to_string()))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout))
            .gzip(true)
            .build()
            .map_err(|e| KilnError::Network(e.to_string()))?;

        let mut url = config.url.clone();
        if !url.ends_with('/') {
            url.push('/');
        }
        let base = Url::parse(&url)
            .map_err(|e| KilnError::config(format!("invalid registry url `{}`: {}", config.url, e)))?;

        Ok(Self {
            client,
            base,
            cache,
            fetched: DashMap::new(),
        })
    }

    /// Get the URL of a package document
    fn package_url(&self, name: &str) -> KilnResult<Url> {
        self.base
            .join(&format!("packages/{}", name))
            .map_err(|e| KilnError::registry(format!("invalid package name `{}`: {}", name, e)))
    }

    /// Get the index document for a package, from memory, disk or network
    async fn package(&self, name: &str) -> KilnResult<Arc<PackageIndex>> {
        if let Some(index) = self.fetched.get(name).map(|entry| entry.value().clone()) {
            return Ok(index);
        }

        let index = match self.cache.get_metadata(name)? {
            Some(cached) => {
                tracing::trace!("Registry cache hit for {}", name);
                let index: PackageIndex = serde_json::from_str(&cached.data)?;
                check_name(name, &index)?;
                index
            }
            None if self.cache.is_offline() => {
                return Err(KilnError::Network(format!(
                    "{} is not cached and offline mode is enabled",
                    name
                )));
            }
            None => self.fetch(name).await?,
        };

        let index = Arc::new(index);
        self.fetched.insert(name.to_string(), index.clone());
        Ok(index)
    }

    async fn fetch(&self, name: &str) -> KilnResult<PackageIndex> {
        let url = self.package_url(name)?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| KilnError::Network(e.to_string()))?;

        if !response.status().is_success() {
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(KilnError::PackageNotFound(name.to_string()));
            }
            return Err(KilnError::Registry(format!(
                "Failed to fetch {}: HTTP {}",
                name,
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| KilnError::Network(e.to_string()))?;

        let index: PackageIndex = serde_json::from_str(&text)?;
        check_name(name, &index)?;

        self.cache.store_metadata(name, &text)?;

        Ok(index)
    }
}

/// A document must describe the package it was requested for
fn check_name(name: &str, index: &PackageIndex) -> KilnResult<()> {
    if index.name != name {
        return Err(KilnError::registry(format!(
            "asked for {} but the registry answered with {}",
            name, index.name
        )));
    }
    Ok(())
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn list_versions(&self, name: &str) -> KilnResult<Vec<String>> {
        let index = self.package(name).await?;
        if index.versions.is_empty() {
            return Err(KilnError::PackageNotFound(name.to_string()));
        }
        Ok(index.version_names())
    }

    async fn list_direct_deps(&self, name: &str, version: &str) -> KilnResult<Vec<Requirement>> {
        let index = self.package(name).await?;
        let entry = index.entry(version).ok_or_else(|| KilnError::VersionNotFound {
            package: name.to_string(),
            interval: version.to_string(),
        })?;
        Ok(entry.dependencies.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CacheConfig;
    use tempfile::tempdir;

    fn offline_registry(dir: &std::path::Path) -> HttpRegistry {
        let cache_config = CacheConfig {
            offline: true,
            ..CacheConfig::default()
        };
        let cache = Arc::new(CacheManager::new(dir, &cache_config).unwrap());
        HttpRegistry::new(&RegistryConfig::default(), cache).unwrap()
    }

    #[test]
    fn test_package_url() {
        let dir = tempdir().unwrap();
        let registry = offline_registry(dir.path());
        assert_eq!(
            registry.package_url("fmt").unwrap().as_str(),
            "https://registry.kiln.dev/api/v1/packages/fmt"
        );
    }

    #[tokio::test]
    async fn test_served_from_cache_when_offline() {
        let dir = tempdir().unwrap();
        let registry = offline_registry(dir.path());
        registry
            .cache
            .store_metadata(
                "fmt",
                r#"{"name":"fmt","versions":[{"version":"7.1.3","dependencies":[{"name":"zlib","interval":"latest"}]}]}"#,
            )
            .unwrap();

        assert_eq!(registry.list_versions("fmt").await.unwrap(), vec!["7.1.3"]);
        let deps = registry.list_direct_deps("fmt", "7.1.3").await.unwrap();
        assert_eq!(deps, vec![Requirement::primary("zlib", "latest")]);
    }

    #[tokio::test]
    async fn test_cached_document_for_another_package_is_rejected() {
        let dir = tempdir().unwrap();
        let registry = offline_registry(dir.path());
        registry
            .cache
            .store_metadata("fmt", r#"{"name":"zlib","versions":[{"version":"1.2.11"}]}"#)
            .unwrap();

        assert!(matches!(
            registry.list_versions("fmt").await,
            Err(KilnError::Registry(msg)) if msg.contains("zlib")
        ));
    }

    #[tokio::test]
    async fn test_offline_miss_is_an_error() {
        let dir = tempdir().unwrap();
        let registry = offline_registry(dir.path());
        assert!(matches!(
            registry.list_versions("boost").await,
            Err(KilnError::Network(_))
        ));
    }
}
