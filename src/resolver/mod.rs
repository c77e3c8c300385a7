//! Dependency resolver for Kiln
//!
//! Resolution runs in four steps:
//!
//! 1. **Activation**: every version that satisfies a requirement is pulled from
//!    the registry, recursively ([`activator`]).
//! 2. **Encoding**: if some package ended up with several versions, the graph
//!    is turned into a CNF formula ([`cnf`]).
//! 3. **Solving**: DPLL finds an assignment that picks exactly one version per
//!    package ([`sat`]).
//! 4. **Finalizing**: the chosen nodes become the one-version-per-name table
//!    consumed by the lockfile and build steps.
//!
//! When several versions of a package could be chosen, the highest one that
//! keeps the whole set satisfiable wins. Packages are settled in the order they
//! were first activated.

pub mod activator;
pub mod cnf;
pub mod graph;
pub mod sat;
pub mod version;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::core::config::ResolverConfig;
use crate::core::package::{Requirement, Source};
use crate::core::{KilnError, KilnResult};
use crate::registry::Registry;

pub use activator::{Activated, ActivatedNode, Activator};
pub use graph::DependencyGraph;
pub use sat::{Solution, Solver};

/// A package picked by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
    pub version: String,
    pub source: Source,
    /// Names of direct dependencies
    pub dependencies: Vec<String>,
}

/// Resolution result: every activated node and the final pick per name
#[derive(Debug, Clone)]
pub struct Resolved {
    pub activated: Vec<ActivatedNode>,
    pub backtracked: BTreeMap<String, ResolvedPackage>,
    /// Solver decisions taken, `None` if no package had competing versions
    pub decisions: Option<u64>,
}

/// Dependency resolver
pub struct Resolver {
    registry: Arc<dyn Registry>,
    config: ResolverConfig,
}

impl Resolver {
    /// Create a new resolver
    pub fn new(registry: Arc<dyn Registry>, config: ResolverConfig) -> Self {
        Self { registry, config }
    }

    /// Resolve a set of declared requirements
    pub async fn resolve(&self, requirements: &[Requirement]) -> KilnResult<Resolved> {
        let activated = Activator::new(self.registry.as_ref())
            .activate_all(requirements)
            .await?;

        let (backtracked, decisions) = if activated.has_duplicates() {
            let (table, decisions) = self.backtrack(&activated)?;
            (table, Some(decisions))
        } else {
            tracing::debug!("No duplicate packages, skipping SAT");
            (project(&activated, 0..activated.nodes.len()), None)
        };

        finalize(activated, backtracked, decisions)
    }

    /// Pick one version per name through SAT
    fn backtrack(&self, activated: &Activated) -> KilnResult<(BTreeMap<String, ResolvedPackage>, u64)> {
        let formula = cnf::encode(activated);
        let mut solver = Solver::new(self.config.max_decisions);
        tracing::debug!(
            "Solving {} clauses over {} variables",
            formula.clauses.len(),
            formula.variables
        );

        let mut model = match solver.solve(&formula)? {
            Solution::Satisfiable(model) => model,
            Solution::Unsatisfiable => return Err(unresolvable(activated)),
        };

        // Settle each duplicated name on its highest satisfiable version
        let mut fixed = formula.clauses.clone();
        for (name, mut positions) in activated.groups() {
            if positions.len() < 2 {
                continue;
            }
            positions.sort_by(|&a, &b| {
                compare_versions(&activated.nodes[b].version, &activated.nodes[a].version)
            });

            for position in positions {
                let var = cnf::variable(position) as usize;
                if model.is_true(var) {
                    fixed.push(vec![cnf::variable(position)]);
                    break;
                }

                let mut attempt = fixed.clone();
                attempt.push(vec![cnf::variable(position)]);
                if let Solution::Satisfiable(better) = solver.solve_clauses(&attempt, formula.variables)? {
                    model = better;
                    fixed = attempt;
                    break;
                }
            }
            tracing::trace!("Settled {}", name);
        }

        tracing::info!(
            "Resolved {} duplicated packages in {} decisions",
            activated.duplicated_names().len(),
            solver.decisions()
        );

        Ok((project(activated, model.selected()), solver.decisions()))
    }
}

/// Table of the given node positions keyed by name
fn project<I>(activated: &Activated, positions: I) -> BTreeMap<String, ResolvedPackage>
where
    I: IntoIterator<Item = usize>,
{
    let mut table = BTreeMap::new();
    for position in positions {
        let node = &activated.nodes[position];
        let mut seen = HashSet::new();
        let dependencies: Vec<String> = node
            .deps
            .iter()
            .map(|d| d.requirement.name.clone())
            .filter(|name| seen.insert(name.clone()))
            .collect();

        let previous = table.insert(
            node.name.clone(),
            ResolvedPackage {
                version: node.version.clone(),
                source: node.source.clone(),
                dependencies,
            },
        );
        assert!(
            previous.is_none(),
            "{} selected twice ({} and {})",
            node.name,
            previous.map(|p| p.version).unwrap_or_default(),
            node.version
        );
    }
    table
}

/// Append packages from other sources and assemble the result
fn finalize(
    mut activated: Activated,
    mut backtracked: BTreeMap<String, ResolvedPackage>,
    decisions: Option<u64>,
) -> KilnResult<Resolved> {
    for requirement in std::mem::take(&mut activated.external) {
        if let Some(existing) = backtracked.get(&requirement.name) {
            return Err(KilnError::SourceConflict {
                package: requirement.name.clone(),
                first: format!("{} {}", existing.source, existing.version),
                second: format!("{} {}", requirement.source, requirement.interval),
            });
        }

        backtracked.insert(
            requirement.name.clone(),
            ResolvedPackage {
                version: requirement.interval.clone(),
                source: requirement.source.clone(),
                dependencies: Vec::new(),
            },
        );
        activated.nodes.push(ActivatedNode {
            name: requirement.name,
            version: requirement.interval,
            source: requirement.source,
            deps: Vec::new(),
        });
    }

    Ok(Resolved {
        activated: activated.nodes,
        backtracked,
        decisions,
    })
}

/// Error naming every package that had competing versions, with the
/// intervals they were requested with
fn unresolvable(activated: &Activated) -> KilnError {
    let packages = activated
        .duplicated_names()
        .into_iter()
        .map(|name| {
            let mut wanted: Vec<&str> = activated
                .nodes
                .iter()
                .flat_map(|n| n.deps.iter())
                .chain(activated.roots.iter())
                .filter(|d| d.requirement.name == name)
                .map(|d| d.requirement.interval.as_str())
                .collect();
            wanted.sort_unstable();
            wanted.dedup();
            if wanted.is_empty() {
                name.to_string()
            } else {
                format!("{} ({})", name, wanted.join(", "))
            }
        })
        .collect();

    KilnError::UnresolvableDependencySet { packages }
}

fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(a), Ok(b)) => version::precedence(&a, &b),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;

    fn resolver(registry: MemoryRegistry) -> Resolver {
        Resolver::new(Arc::new(registry), ResolverConfig::default())
    }

    fn picked(resolved: &Resolved) -> Vec<(String, String)> {
        resolved
            .backtracked
            .iter()
            .map(|(name, p)| (name.clone(), p.version.clone()))
            .collect()
    }

    fn pair(name: &str, version: &str) -> (String, String) {
        (name.to_string(), version.to_string())
    }

    #[tokio::test]
    async fn test_end_to_end_picks_highest_matching() {
        let registry = MemoryRegistry::new()
            .with("app", "1.0.0", vec![Requirement::primary("lib", ">=1.0.0 and <2.0.0")])
            .with("lib", "1.0.0", vec![])
            .with("lib", "1.5.0", vec![])
            .with("lib", "2.0.0", vec![]);

        let resolved = resolver(registry)
            .resolve(&[Requirement::primary("app", "1.0.0")])
            .await
            .unwrap();

        assert_eq!(picked(&resolved), vec![pair("app", "1.0.0"), pair("lib", "1.5.0")]);
        assert!(resolved.decisions.is_some());
        assert_eq!(resolved.backtracked["app"].dependencies, vec!["lib"]);
        assert_eq!(resolved.backtracked["lib"].source, Source::Primary);
        assert_eq!(resolved.activated.len(), 3);
    }

    #[tokio::test]
    async fn test_without_duplicates_table_matches_activation() {
        let registry = MemoryRegistry::new()
            .with("app", "1.0.0", vec![
                Requirement::primary("fmt", "latest"),
                Requirement::primary("zlib", ">=1.2.0"),
            ])
            .with("fmt", "6.0.0", vec![])
            .with("fmt", "7.1.3", vec![Requirement::primary("zlib", "1.2.11")])
            .with("zlib", "1.2.11", vec![]);

        let resolved = resolver(registry)
            .resolve(&[Requirement::primary("app", "1.0.0")])
            .await
            .unwrap();

        let projection: Vec<(String, String)> = {
            let mut nodes: Vec<_> = resolved
                .activated
                .iter()
                .map(|n| pair(&n.name, &n.version))
                .collect();
            nodes.sort();
            nodes
        };
        assert_eq!(picked(&resolved), projection);
        assert_eq!(resolved.decisions, None);
        assert_eq!(
            picked(&resolved),
            vec![pair("app", "1.0.0"), pair("fmt", "7.1.3"), pair("zlib", "1.2.11")]
        );
    }

    #[tokio::test]
    async fn test_repeated_dependency_listed_once() {
        let registry = MemoryRegistry::new()
            .with("app", "1.0.0", vec![
                Requirement::primary("zlib", "latest"),
                Requirement::primary("fmt", "latest"),
                Requirement::primary("zlib", ">=1.2.0"),
            ])
            .with("fmt", "7.1.3", vec![])
            .with("zlib", "1.2.11", vec![]);

        let resolved = resolver(registry)
            .resolve(&[Requirement::primary("app", "1.0.0")])
            .await
            .unwrap();

        assert_eq!(resolved.backtracked["app"].dependencies, vec!["zlib", "fmt"]);
    }

    #[tokio::test]
    async fn test_shared_dependency_narrowed_by_both_parents() {
        let registry = MemoryRegistry::new()
            .with("app", "1.0.0", vec![
                Requirement::primary("left", "1.0.0"),
                Requirement::primary("right", "1.0.0"),
            ])
            .with("left", "1.0.0", vec![Requirement::primary("zlib", ">=1.0.0 and <2.0.0")])
            .with("right", "1.0.0", vec![Requirement::primary("zlib", "<=1.2.0")])
            .with("zlib", "1.0.0", vec![])
            .with("zlib", "1.2.0", vec![])
            .with("zlib", "1.3.0", vec![]);

        let resolved = resolver(registry)
            .resolve(&[Requirement::primary("app", "1.0.0")])
            .await
            .unwrap();

        // 1.3.0 satisfies left only; 1.2.0 is the highest both accept
        assert_eq!(resolved.backtracked["zlib"].version, "1.2.0");
    }

    #[tokio::test]
    async fn test_disjoint_requirements_are_unresolvable() {
        let registry = MemoryRegistry::new()
            .with("app", "1.0.0", vec![
                Requirement::primary("left", "1.0.0"),
                Requirement::primary("right", "1.0.0"),
            ])
            .with("left", "1.0.0", vec![Requirement::primary("shared", "<2.0.0")])
            .with("right", "1.0.0", vec![Requirement::primary("shared", ">=2.0.0")])
            .with("shared", "1.0.0", vec![])
            .with("shared", "2.0.0", vec![]);

        let result = resolver(registry)
            .resolve(&[Requirement::primary("app", "1.0.0")])
            .await;

        match result {
            Err(KilnError::UnresolvableDependencySet { packages }) => {
                assert_eq!(packages, vec!["shared (<2.0.0, >=2.0.0)"]);
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.backtracked)),
        }
    }

    #[tokio::test]
    async fn test_project_requirement_is_honoured() {
        let registry = MemoryRegistry::new()
            .with("app", "1.0.0", vec![Requirement::primary("lib", ">=2.0.0")])
            .with("lib", "1.0.0", vec![])
            .with("lib", "2.0.0", vec![]);

        let result = resolver(registry)
            .resolve(&[
                Requirement::primary("app", "1.0.0"),
                Requirement::primary("lib", "1.0.0"),
            ])
            .await;

        match result {
            Err(KilnError::UnresolvableDependencySet { packages }) => {
                assert_eq!(packages, vec!["lib (1.0.0, >=2.0.0)"]);
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.backtracked)),
        }
    }

    #[tokio::test]
    async fn test_cycle_resolves() {
        let registry = MemoryRegistry::new()
            .with("a", "1.0.0", vec![Requirement::primary("b", "latest")])
            .with("b", "1.0.0", vec![Requirement::primary("a", "1.0.0")]);

        let resolved = resolver(registry)
            .resolve(&[Requirement::primary("a", "1.0.0")])
            .await
            .unwrap();

        assert_eq!(picked(&resolved), vec![pair("a", "1.0.0"), pair("b", "1.0.0")]);
    }

    #[tokio::test]
    async fn test_external_packages_are_merged_verbatim() {
        let github = Source::Other("github".to_string());
        let registry = MemoryRegistry::new()
            .with("app", "1.0.0", vec![Requirement::new("spdlog", "v1.8.0", github.clone())]);

        let resolved = resolver(registry)
            .resolve(&[
                Requirement::primary("app", "1.0.0"),
                Requirement::new("json", "v3.9.1", github.clone()),
            ])
            .await
            .unwrap();

        assert_eq!(
            picked(&resolved),
            vec![pair("app", "1.0.0"), pair("json", "v3.9.1"), pair("spdlog", "v1.8.0")]
        );
        assert_eq!(resolved.backtracked["spdlog"].source, github);
        assert_eq!(resolved.backtracked["app"].dependencies, vec!["spdlog"]);
        assert_eq!(resolved.activated.len(), 3);
    }

    #[tokio::test]
    async fn test_external_cannot_shadow_primary() {
        let github = Source::Other("github".to_string());
        let registry = MemoryRegistry::new().with("fmt", "7.1.3", vec![]);

        let result = resolver(registry)
            .resolve(&[
                Requirement::primary("fmt", "latest"),
                Requirement::new("fmt", "master", github),
            ])
            .await;

        assert!(matches!(result, Err(KilnError::SourceConflict { package, .. }) if package == "fmt"));
    }

    #[tokio::test]
    async fn test_decision_budget_is_enforced() {
        let registry = MemoryRegistry::new()
            .with("app", "1.0.0", vec![
                Requirement::primary("lib", "<2.0.0"),
                Requirement::primary("zlib", "<2.0.0"),
            ])
            .with("lib", "1.0.0", vec![])
            .with("lib", "1.1.0", vec![])
            .with("zlib", "1.0.0", vec![])
            .with("zlib", "1.1.0", vec![]);

        let resolver = Resolver::new(Arc::new(registry), ResolverConfig { max_decisions: 1 });
        let resolved = resolver
            .resolve(&[Requirement::primary("app", "1.0.0")])
            .await;

        // two independent choices cannot be made with a single decision
        assert!(matches!(
            resolved,
            Err(KilnError::ResolutionLimitExceeded { limit: 1 })
        ));
    }
}
