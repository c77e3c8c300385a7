//! Core module for Kiln
//!
//! This module contains the central engine, configuration, error types,
//! manifest and lockfile handling.

pub mod config;
pub mod error;
pub mod lockfile;
pub mod engine;
pub mod package;

pub use config::Config;
pub use error::{KilnError, KilnResult};
pub use lockfile::Lockfile;
pub use engine::Engine;
pub use package::Manifest;
