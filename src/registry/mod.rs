//! Package registry access
//!
//! The resolver only needs two queries from a registry: the published
//! versions of a package, and the direct dependencies of one version.

pub mod client;
pub mod memory;
pub mod types;

use async_trait::async_trait;

use crate::core::package::Requirement;
use crate::core::KilnResult;

pub use client::HttpRegistry;
pub use memory::MemoryRegistry;

/// Read-only view of a package registry
#[async_trait]
pub trait Registry: Send + Sync {
    /// Published versions of `name`, in registry order.
    ///
    /// Fails with `PackageNotFound` if the registry does not know the package.
    async fn list_versions(&self, name: &str) -> KilnResult<Vec<String>>;

    /// Direct dependencies of `name` at `version`
    async fn list_direct_deps(&self, name: &str, version: &str) -> KilnResult<Vec<Requirement>>;
}
