//! kiln tree - Show the resolved dependency tree and build order

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use clap::Args;

use crate::cli::output;
use crate::core::{Engine, KilnError, KilnResult, Manifest};
use crate::resolver::{DependencyGraph, ResolvedPackage};

#[derive(Args)]
pub struct TreeArgs {
    /// Project directory (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Maximum depth to print
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Show which packages pull in PACKAGE instead of the full tree
    #[arg(long, value_name = "PACKAGE")]
    pub why: Option<String>,
}

pub async fn execute(args: TreeArgs, json_output: bool) -> KilnResult<()> {
    let project_dir = super::project_dir(&args.path)?;

    let engine = Engine::new(&project_dir)?;
    engine.ensure_initialized()?;

    let manifest = engine.manifest()?;
    let requirements = manifest.requirements();
    let resolved = engine.resolver().resolve(&requirements).await?;

    let graph = DependencyGraph::from_resolved(&resolved.backtracked);
    if let Some(ref package) = args.why {
        return why(&graph, &manifest, &resolved.backtracked, package, json_output);
    }

    let build_order = graph.build_order();
    let cycle = graph.find_cycle();

    if json_output {
        output::json(&serde_json::json!({
            "packages": resolved.backtracked,
            "package_count": graph.package_count(),
            "build_order": build_order,
            "cycle": cycle
        }))?;
        return Ok(());
    }

    output::line(&output::package_version(
        &manifest.package.name,
        &manifest.package.version,
    ));
    let mut seen = HashSet::new();
    for requirement in &requirements {
        print_node(&resolved.backtracked, &requirement.name, 1, args.depth, &mut seen);
    }

    output::divider();
    if graph.has_cycle() {
        let cycle = cycle.unwrap_or_default();
        output::warning(&format!("No build order, dependency cycle: {}", cycle.join(" -> ")));
    } else if let Some(order) = build_order {
        output::info(&format!("Build order ({} packages):", graph.package_count()));
        for (i, package) in order.iter().enumerate() {
            output::line(&format!("  {:>3}. {}", i + 1, package));
        }
    }

    Ok(())
}

/// Print the packages that depend directly on `package`
fn why(
    graph: &DependencyGraph,
    manifest: &Manifest,
    table: &BTreeMap<String, ResolvedPackage>,
    package: &str,
    json_output: bool,
) -> KilnResult<()> {
    let Some(resolved) = table.get(package) else {
        return Err(KilnError::PackageNotFound(package.to_string()));
    };
    let dependents = graph.dependents(package);
    let direct = manifest.dependencies.contains_key(package);

    if json_output {
        output::json(&serde_json::json!({
            "package": package,
            "version": resolved.version,
            "direct": direct,
            "dependents": dependents
        }))?;
        return Ok(());
    }

    output::line(&output::package_version(package, &resolved.version));
    if direct {
        output::line(&format!("  required by {}", manifest.package.name));
    }
    for dependent in &dependents {
        output::line(&format!("  required by {}", dependent));
    }

    Ok(())
}

/// Print one package and, the first time it is seen, its dependencies
fn print_node(
    table: &BTreeMap<String, ResolvedPackage>,
    name: &str,
    depth: usize,
    max_depth: Option<usize>,
    seen: &mut HashSet<String>,
) {
    let indent = "  ".repeat(depth);
    let Some(package) = table.get(name) else {
        output::line(&format!("{}{} {}", indent, name, console::style("(missing)").red()));
        return;
    };

    let expanded = !seen.insert(name.to_string());
    let marker = if expanded && !package.dependencies.is_empty() {
        console::style(" (*)").dim().to_string()
    } else {
        String::new()
    };
    output::line(&format!(
        "{}{}{}",
        indent,
        output::package_version(name, &package.version),
        marker
    ));

    if expanded || max_depth.map_or(false, |max| depth >= max) {
        return;
    }
    for dep in &package.dependencies {
        print_node(table, dep, depth + 1, max_depth, seen);
    }
}
