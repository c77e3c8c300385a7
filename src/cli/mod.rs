//! CLI module for Kiln
//!
//! Provides command-line interface using clap.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use commands::*;

/// Kiln - dependency resolver for native packages
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author = "Kiln Contributors")]
#[command(version)]
#[command(about = "Resolve package dependencies to one version per package", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress all output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve dependencies and write kiln.lock
    #[command(visible_alias = "r")]
    Resolve(resolve::ResolveArgs),

    /// Show the resolved dependency tree and build order
    #[command(visible_alias = "t")]
    Tree(tree::TreeArgs),

    /// Manage the registry metadata cache
    Cache(cache::CacheArgs),
}
