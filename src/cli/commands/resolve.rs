//! kiln resolve - Resolve dependencies and write the lockfile

use std::path::PathBuf;
use std::time::Instant;
use clap::Args;

use crate::cli::output;
use crate::core::lockfile::LockfileDiff;
use crate::core::package::Source;
use crate::core::{Engine, KilnError, KilnResult, Lockfile};

#[derive(Args)]
pub struct ResolveArgs {
    /// Project directory (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Fail if kiln.lock is missing or would change
    #[arg(long)]
    pub locked: bool,

    /// Resolve without writing kiln.lock
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: ResolveArgs, json_output: bool) -> KilnResult<()> {
    let start_time = Instant::now();
    let project_dir = super::project_dir(&args.path)?;

    let engine = Engine::new(&project_dir)?;
    engine.ensure_initialized()?;

    let manifest = engine.manifest()?;
    let requirements = manifest.requirements();
    let existing_lockfile = engine.lockfile()?;

    let progress = if !json_output {
        Some(output::spinner(&format!(
            "Resolving {} dependencies of '{}'...",
            requirements.len(),
            manifest.package.name
        )))
    } else {
        None
    };

    let result = engine.resolver().resolve(&requirements).await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let resolved = result?;

    let mut lockfile = Lockfile::from_resolved(&resolved);
    let diff = existing_lockfile.as_ref().map(|existing| existing.diff(&lockfile));

    if args.locked {
        match diff {
            None => {
                return Err(KilnError::other(
                    "No lockfile found. Run 'kiln resolve' without --locked to generate one.",
                ))
            }
            Some(ref diff) if !diff.is_empty() => return Err(KilnError::LockfileOutOfDate),
            Some(_) => {}
        }
    }

    let written = !args.dry_run && !args.locked;
    if written {
        lockfile.save(&engine.project_dir)?;
    }

    let duration = start_time.elapsed().as_millis();

    if json_output {
        output::json(&serde_json::json!({
            "success": true,
            "packages": resolved.backtracked,
            "activated": resolved.activated.len(),
            "decisions": resolved.decisions,
            "changes": diff,
            "lockfile_written": written,
            "duration_ms": duration
        }))?;
        return Ok(());
    }

    for (name, package) in &resolved.backtracked {
        let pinned = output::package_version(name, &package.version);
        match package.source {
            Source::Primary => output::line(&format!("  {}", pinned)),
            Source::Other(ref tag) => output::line(&format!(
                "  {} {}",
                pinned,
                console::style(format!("({})", tag)).dim()
            )),
        }
    }

    if let Some(ref diff) = diff {
        print_changes(diff);
    }

    output::success(&format!(
        "Resolved {} packages in {}",
        resolved.backtracked.len(),
        output::format_duration(duration)
    ));
    if args.dry_run {
        output::info("Dry run, kiln.lock not written");
    }

    Ok(())
}

fn print_changes(diff: &LockfileDiff) {
    if diff.is_empty() {
        return;
    }

    output::divider();
    let changes = [
        (console::style("+").green(), &diff.added),
        (console::style("~").yellow(), &diff.changed),
        (console::style("-").red(), &diff.removed),
    ];
    for (marker, packages) in changes {
        for pkg in packages {
            output::line(&format!(
                "  {} {}",
                marker,
                output::package_version(&pkg.name, &pkg.version)
            ));
        }
    }
    output::info(&format!("{} lockfile changes", diff.total_changes()));
}
