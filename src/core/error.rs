//! Error types for Kiln

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Kiln operations
pub type KilnResult<T> = Result<T, KilnError>;

/// Main error type for Kiln
#[derive(Error, Debug)]
pub enum KilnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid interval `{interval}`: {reason}")]
    InvalidIntervalSyntax { interval: String, reason: String },

    #[error("Interval `{interval}` is redundant. Did you mean `{suggestion}`?")]
    RedundantInterval { interval: String, suggestion: String },

    #[error("Interval `{interval}` does not enclose any version: {reason}")]
    UnboundedInterval { interval: String, reason: String },

    #[error("No published version matches `{interval}`")]
    NoMatchingVersion { interval: String },

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Version not found: {package} {interval}")]
    VersionNotFound { package: String, interval: String },

    #[error("Unable to resolve a consistent version for: {}", .packages.join(", "))]
    UnresolvableDependencySet { packages: Vec<String> },

    #[error("Conflicting sources for {package}: {first} and {second}")]
    SourceConflict {
        package: String,
        first: String,
        second: String,
    },

    #[error("Resolution gave up after {limit} decisions")]
    ResolutionLimitExceeded { limit: u64 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lockfile corrupted or invalid")]
    InvalidLockfile,

    #[error("Lockfile is out of date. Run 'kiln resolve' without --locked to update it.")]
    LockfileOutOfDate,

    #[error("Project not initialized: no kiln.toml found")]
    NotInitialized,

    #[error("Invalid manifest {path}: {reason}")]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

impl KilnError {
    /// Create a generic error from a string
    pub fn other<S: Into<String>>(msg: S) -> Self {
        KilnError::Other(msg.into())
    }

    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        KilnError::Config(msg.into())
    }

    /// Create a registry error
    pub fn registry<S: Into<String>>(msg: S) -> Self {
        KilnError::Registry(msg.into())
    }

    /// Create a cache error
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        KilnError::Cache(msg.into())
    }

    /// Create an interval syntax error
    pub fn interval_syntax<S: Into<String>, R: Into<String>>(interval: S, reason: R) -> Self {
        KilnError::InvalidIntervalSyntax {
            interval: interval.into(),
            reason: reason.into(),
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            KilnError::PackageNotFound(_) => 2,
            KilnError::VersionNotFound { .. } => 2,
            KilnError::UnresolvableDependencySet { .. } => 3,
            KilnError::SourceConflict { .. } => 3,
            KilnError::ResolutionLimitExceeded { .. } => 3,
            KilnError::InvalidIntervalSyntax { .. } => 4,
            KilnError::RedundantInterval { .. } => 4,
            KilnError::UnboundedInterval { .. } => 4,
            KilnError::NoMatchingVersion { .. } => 4,
            KilnError::NotInitialized => 5,
            _ => 1,
        }
    }
}
