//! CLI command implementations

pub mod cache;
pub mod resolve;
pub mod tree;

use std::env;
use std::path::{Path, PathBuf};

use crate::core::KilnResult;

/// Resolve a command's path argument against the current directory
pub(crate) fn project_dir(path: &Path) -> KilnResult<PathBuf> {
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()?.join(path)
    })
}
