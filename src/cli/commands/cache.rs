//! kiln cache - Manage the registry metadata cache

use std::env;
use clap::{Args, Subcommand};

use crate::cache::CacheManager;
use crate::cli::output;
use crate::core::{Config, KilnResult};

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Show cache location and size
    Info,

    /// Remove every cached registry document
    Clean,
}

pub async fn execute(args: CacheArgs, json_output: bool) -> KilnResult<()> {
    let project_dir = env::current_dir()?;
    let config = Config::load(&project_dir)?;
    let cache = CacheManager::new(&config.cache_dir()?, &config.cache)?;

    match args.command {
        CacheCommands::Info => info(&cache, json_output),
        CacheCommands::Clean => clean(&cache, json_output),
    }
}

fn info(cache: &CacheManager, json_output: bool) -> KilnResult<()> {
    let stats = cache.stats()?;

    if json_output {
        output::json(&serde_json::json!({
            "path": stats.path,
            "size_bytes": stats.total_size,
            "size_human": output::format_bytes(stats.total_size),
            "entries": stats.entry_count,
            "offline": cache.is_offline()
        }))?;
    } else {
        output::info("Cache Information");
        output::divider();
        output::line(&format!("  Path: {}", stats.path.display()));
        output::line(&format!("  Size: {}", output::format_bytes(stats.total_size)));
        output::line(&format!("  Packages: {}", stats.entry_count));
        if cache.is_offline() {
            output::line("  Offline mode: on");
        }
    }

    Ok(())
}

fn clean(cache: &CacheManager, json_output: bool) -> KilnResult<()> {
    let stats = cache.stats()?;
    cache.clear()?;

    if json_output {
        output::json(&serde_json::json!({
            "success": true,
            "removed": stats.entry_count,
            "freed_bytes": stats.total_size,
            "freed_human": output::format_bytes(stats.total_size)
        }))?;
    } else if stats.entry_count == 0 {
        output::info("Cache is already empty");
    } else {
        output::success(&format!(
            "Removed {} cached packages ({})",
            stats.entry_count,
            output::format_bytes(stats.total_size)
        ));
    }

    Ok(())
}
