//! Activation: expanding requirements into concrete package versions
//!
//! Every published version that satisfies a requirement becomes a node. The
//! same name may therefore appear several times with different versions;
//! picking one of them is left to the SAT stage.
//!
//! Nodes are interned by (name, version) in an arena while the graph is being
//! walked and renumbered into post-order (children before parents) once the
//! walk is complete. Dependency edges are stored as positions in that final
//! sequence, which is also the CNF variable numbering.

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt};

use crate::core::package::{Requirement, Source};
use crate::core::{KilnError, KilnResult};
use crate::registry::Registry;
use crate::resolver::version::VersionInterval;

type NodeId = usize;

/// A concrete package version reached during activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedNode {
    pub name: String,
    pub version: String,
    pub source: Source,
    pub deps: Vec<Dependency>,
}

/// One direct dependency of an activated node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// The requirement as published by the registry
    pub requirement: Requirement,
    /// Positions of every activated version satisfying the requirement.
    /// Empty for non-primary sources, which are never activated.
    pub candidates: Vec<usize>,
}

/// Result of activation: nodes in post-order plus packages from other sources
#[derive(Debug, Clone, Default)]
pub struct Activated {
    pub nodes: Vec<ActivatedNode>,
    /// The project's own primary requirements and their candidates
    pub roots: Vec<Dependency>,
    /// Non-primary requirements, taken verbatim
    pub external: Vec<Requirement>,
}

impl Activated {
    /// Node positions grouped by package name, in order of first occurrence
    pub fn groups(&self) -> Vec<(&str, Vec<usize>)> {
        let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();
        let mut by_name: HashMap<&str, usize> = HashMap::new();

        for (position, node) in self.nodes.iter().enumerate() {
            match by_name.get(node.name.as_str()) {
                Some(&group) => groups[group].1.push(position),
                None => {
                    by_name.insert(&node.name, groups.len());
                    groups.push((&node.name, vec![position]));
                }
            }
        }

        groups
    }

    /// Names activated with more than one version
    pub fn duplicated_names(&self) -> Vec<&str> {
        self.groups()
            .into_iter()
            .filter(|(_, positions)| positions.len() > 1)
            .map(|(name, _)| name)
            .collect()
    }

    pub fn has_duplicates(&self) -> bool {
        !self.duplicated_names().is_empty()
    }
}

/// Walks the registry depth-first to build an [`Activated`] sequence
pub struct Activator<'a> {
    registry: &'a dyn Registry,
    /// Nodes in allocation order (pre-order)
    arena: Vec<ActivatedNode>,
    interned: HashMap<(String, String), NodeId>,
    /// Completed nodes, post-order
    order: Vec<NodeId>,
    roots: Vec<Dependency>,
    external: Vec<Requirement>,
}

impl<'a> Activator<'a> {
    pub fn new(registry: &'a dyn Registry) -> Self {
        Self {
            registry,
            arena: Vec::new(),
            interned: HashMap::new(),
            order: Vec::new(),
            roots: Vec::new(),
            external: Vec::new(),
        }
    }

    /// Activate all top-level requirements, in order
    pub async fn activate_all(mut self, requirements: &[Requirement]) -> KilnResult<Activated> {
        for requirement in requirements {
            if requirement.source.is_primary() {
                let candidates = self.activate(requirement, &[]).await?;
                self.roots.push(Dependency {
                    requirement: requirement.clone(),
                    candidates,
                });
            } else {
                self.record_external(requirement)?;
            }
        }

        let activated = self.finish();
        tracing::debug!(
            "Activated {} nodes ({} external)",
            activated.nodes.len(),
            activated.external.len()
        );
        Ok(activated)
    }

    /// Activate every candidate of `requirement` and return their ids.
    ///
    /// `ancestors` is the chain of nodes currently being expanded.
    fn activate<'s>(
        &'s mut self,
        requirement: &'s Requirement,
        ancestors: &'s [NodeId],
    ) -> BoxFuture<'s, KilnResult<Vec<NodeId>>> {
        async move {
            let interval = VersionInterval::parse(&requirement.interval)?;
            let published = self.registry.list_versions(&requirement.name).await?;
            let candidates = interval
                .select_candidates(&published)
                .map_err(|_| KilnError::VersionNotFound {
                    package: requirement.name.clone(),
                    interval: requirement.interval.clone(),
                })?;

            tracing::debug!(
                "Activating {} {} -> {:?}",
                requirement.name,
                requirement.interval,
                candidates
            );

            let mut ids = Vec::with_capacity(candidates.len());
            for version in candidates {
                let key = (requirement.name.clone(), version);

                if let Some(&id) = self.interned.get(&key) {
                    if ancestors.contains(&id) {
                        tracing::trace!("Cycle through {}@{}, not expanding again", key.0, key.1);
                    } else {
                        tracing::trace!("{}@{} already activated", key.0, key.1);
                    }
                    ids.push(id);
                    continue;
                }

                let id = self.arena.len();
                self.arena.push(ActivatedNode {
                    name: key.0.clone(),
                    version: key.1.clone(),
                    source: Source::Primary,
                    deps: Vec::new(),
                });
                self.interned.insert(key.clone(), id);

                let direct = self.registry.list_direct_deps(&key.0, &key.1).await?;

                let mut chain = ancestors.to_vec();
                chain.push(id);

                let mut deps = Vec::with_capacity(direct.len());
                for dep in direct {
                    let candidates = if dep.source.is_primary() {
                        self.activate(&dep, &chain).await?
                    } else {
                        self.record_external(&dep)?;
                        Vec::new()
                    };
                    deps.push(Dependency {
                        requirement: dep,
                        candidates,
                    });
                }

                self.arena[id].deps = deps;
                self.order.push(id);
                ids.push(id);
            }

            Ok(ids)
        }
        .boxed()
    }

    /// Remember a non-primary requirement. One name may only map to one
    /// (source, interval) pair.
    fn record_external(&mut self, requirement: &Requirement) -> KilnResult<()> {
        match self.external.iter().find(|r| r.name == requirement.name) {
            Some(existing) if existing == requirement => Ok(()),
            Some(existing) => Err(KilnError::SourceConflict {
                package: requirement.name.clone(),
                first: format!("{} {}", existing.source, existing.interval),
                second: format!("{} {}", requirement.source, requirement.interval),
            }),
            None => {
                tracing::debug!("Recording {} from {}", requirement.name, requirement.source);
                self.external.push(requirement.clone());
                Ok(())
            }
        }
    }

    /// Renumber the arena into post-order
    fn finish(self) -> Activated {
        let mut position = vec![0; self.arena.len()];
        for (pos, &id) in self.order.iter().enumerate() {
            position[id] = pos;
        }
        debug_assert_eq!(self.order.len(), self.arena.len(), "unfinished activation");

        let renumber = |deps: &mut Vec<Dependency>| {
            for dep in deps {
                for candidate in &mut dep.candidates {
                    *candidate = position[*candidate];
                }
            }
        };

        let mut numbered: Vec<(usize, ActivatedNode)> = self
            .arena
            .into_iter()
            .enumerate()
            .map(|(id, mut node)| {
                renumber(&mut node.deps);
                (position[id], node)
            })
            .collect();
        numbered.sort_by_key(|(pos, _)| *pos);

        let mut roots = self.roots;
        renumber(&mut roots);

        Activated {
            nodes: numbered.into_iter().map(|(_, node)| node).collect(),
            roots,
            external: self.external,
        }
    }
}
