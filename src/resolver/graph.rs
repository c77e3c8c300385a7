//! Graph over the final resolution, one node per package name

use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::resolver::ResolvedPackage;

/// Dependency graph for resolved packages
#[derive(Debug)]
pub struct DependencyGraph {
    /// Nodes are `name@version`, edges point from dependent to dependency
    graph: DiGraph<String, ()>,
    /// Map from package name to node index
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        }
    }

    /// Build from a resolution table. Dependencies without an entry in the
    /// table are skipped.
    pub fn from_resolved(table: &BTreeMap<String, ResolvedPackage>) -> Self {
        let mut graph = Self::new();
        for (name, package) in table {
            graph.add_package(name, &package.version);
        }
        for (name, package) in table {
            for dep in &package.dependencies {
                graph.add_dependency(name, dep);
            }
        }
        graph
    }

    /// Add a package to the graph
    pub fn add_package(&mut self, name: &str, version: &str) {
        if !self.nodes.contains_key(name) {
            let idx = self.graph.add_node(format!("{}@{}", name, version));
            self.nodes.insert(name.to_string(), idx);
        }
    }

    /// Add a dependency edge
    pub fn add_dependency(&mut self, from: &str, to: &str) {
        if let (Some(&from_idx), Some(&to_idx)) = (self.nodes.get(from), self.nodes.get(to)) {
            if !self.graph.contains_edge(from_idx, to_idx) {
                self.graph.add_edge(from_idx, to_idx, ());
            }
        }
    }

    /// Check if the graph has a cycle
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Find a cycle in the graph (if any). The first entry is repeated at
    /// the end.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut on_stack = Vec::new();

        for node in self.graph.node_indices() {
            if !visited.contains(&node) {
                if let Some(cycle) = self.dfs_cycle(node, &mut visited, &mut on_stack) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        on_stack: &mut Vec<NodeIndex>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        on_stack.push(node);

        for neighbor in self.graph.neighbors_directed(node, Direction::Outgoing) {
            if let Some(start) = on_stack.iter().position(|&n| n == neighbor) {
                let mut cycle: Vec<String> = on_stack[start..]
                    .iter()
                    .map(|&n| self.graph[n].clone())
                    .collect();
                cycle.push(self.graph[neighbor].clone());
                return Some(cycle);
            }
            if !visited.contains(&neighbor) {
                if let Some(cycle) = self.dfs_cycle(neighbor, visited, on_stack) {
                    return Some(cycle);
                }
            }
        }

        on_stack.pop();
        None
    }

    /// Packages with every dependency before its dependents, or `None` if
    /// the graph has a cycle
    pub fn build_order(&self) -> Option<Vec<String>> {
        let mut order = toposort(&self.graph, None).ok()?;
        order.reverse();
        Some(order.into_iter().map(|idx| self.graph[idx].clone()).collect())
    }

    /// Packages that depend directly on `name`, sorted
    pub fn dependents(&self, name: &str) -> Vec<String> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut found: Vec<String> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].clone())
            .collect();
        found.sort();
        found
    }

    /// Get the number of packages
    pub fn package_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::package::Source;

    fn table(entries: &[(&str, &[&str])]) -> BTreeMap<String, ResolvedPackage> {
        entries
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    ResolvedPackage {
                        version: "1.0.0".to_string(),
                        source: Source::Primary,
                        dependencies: deps.iter().map(|d| d.to_string()).collect(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_simple_graph() {
        let graph = DependencyGraph::from_resolved(&table(&[("a", &["b"]), ("b", &["c"]), ("c", &[])]));

        assert!(!graph.has_cycle());
        assert!(graph.find_cycle().is_none());
        assert_eq!(graph.package_count(), 3);
        assert_eq!(graph.dependents("c"), vec!["b@1.0.0"]);
        assert!(graph.dependents("a").is_empty());
    }

    #[test]
    fn test_cycle_detection() {
        let graph = DependencyGraph::from_resolved(&table(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"])]));

        assert!(graph.has_cycle());
        assert_eq!(
            graph.find_cycle().unwrap(),
            vec!["a@1.0.0", "b@1.0.0", "c@1.0.0", "a@1.0.0"]
        );
        assert!(graph.build_order().is_none());
    }

    #[test]
    fn test_build_order_puts_dependencies_first() {
        let graph = DependencyGraph::from_resolved(&table(&[
            ("app", &["fmt", "zlib"]),
            ("fmt", &["zlib"]),
            ("zlib", &[]),
        ]));

        assert_eq!(graph.dependents("zlib"), vec!["app@1.0.0", "fmt@1.0.0"]);

        let order = graph.build_order().unwrap();
        let at = |name: &str| order.iter().position(|n| n.starts_with(name)).unwrap();
        assert!(at("zlib") < at("fmt"));
        assert!(at("fmt") < at("app"));
    }

    #[test]
    fn test_unknown_dependencies_are_skipped() {
        let graph = DependencyGraph::from_resolved(&table(&[("a", &["ghost"])]));
        assert_eq!(graph.package_count(), 1);
        assert!(graph.dependents("a").is_empty());
        assert!(graph.dependents("ghost").is_empty());
        assert!(graph.build_order().is_some());
    }
}
