//! Resolved dependency graph using petgraph
//!
//! Built from a successful resolution for display and inspection. Cycles
//! between packages are legal and are kept as they are.

use std::collections::HashSet;

use indexmap::IndexMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use sprig_core::{PackageSelector, Version, VersionRange};

use crate::solver::Resolution;

/// Node in the dependency graph representing a resolved package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageNode {
    pub selector: PackageSelector,
    pub version: Version,
}

/// Edge in the dependency graph representing a requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Range the depender accepts
    pub range: VersionRange,
    /// Whether the requirement was guarded by an environment marker
    pub conditional: bool,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<PackageNode, DependencyEdge>,
    /// Map from selector to NodeIndex, in insertion order
    node_map: IndexMap<PackageSelector, NodeIndex>,
    roots: Vec<NodeIndex>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of a resolution. `roots` are the directly required
    /// selectors; those missing from the resolution are ignored.
    pub fn from_resolution<'a>(
        resolution: &Resolution,
        roots: impl IntoIterator<Item = &'a PackageSelector>,
    ) -> Self {
        let mut graph = Self::new();
        for (selector, version) in &resolution.packages {
            graph.add_package(PackageNode {
                selector: selector.clone(),
                version: version.clone(),
            });
        }
        for (depender, dependencies) in &resolution.dependencies {
            for dependency in dependencies {
                let edge = DependencyEdge {
                    range: dependency.range.clone(),
                    conditional: dependency.marker.is_some(),
                };
                // Every chosen version's dependencies are themselves chosen
                let _ = graph.add_dependency(depender, &dependency.selector, edge);
            }
        }
        for root in roots {
            if let Some(&idx) = graph.node_map.get(root) {
                graph.roots.push(idx);
            }
        }
        graph
    }

    /// Add a package node, returning the existing index for a known selector
    pub fn add_package(&mut self, package: PackageNode) -> NodeIndex {
        if let Some(&existing) = self.node_map.get(&package.selector) {
            return existing;
        }
        let selector = package.selector.clone();
        let idx = self.graph.add_node(package);
        self.node_map.insert(selector, idx);
        idx
    }

    /// Add dependency edge between two packages
    pub fn add_dependency(
        &mut self,
        from: &PackageSelector,
        to: &PackageSelector,
        edge: DependencyEdge,
    ) -> Result<(), String> {
        let from_idx = *self
            .node_map
            .get(from)
            .ok_or_else(|| format!("Package not found: {}", from))?;
        let to_idx = *self
            .node_map
            .get(to)
            .ok_or_else(|| format!("Package not found: {}", to))?;
        self.graph.add_edge(from_idx, to_idx, edge);
        Ok(())
    }

    pub fn get_package(&self, selector: &PackageSelector) -> Option<&PackageNode> {
        let idx = self.node_map.get(selector)?;
        self.graph.node_weight(*idx)
    }

    /// Get all packages in insertion order
    pub fn packages(&self) -> impl Iterator<Item = &PackageNode> {
        self.node_map
            .values()
            .filter_map(|idx| self.graph.node_weight(*idx))
    }

    pub fn roots(&self) -> impl Iterator<Item = &PackageNode> {
        self.roots
            .iter()
            .filter_map(|idx| self.graph.node_weight(*idx))
    }

    /// Direct dependencies of a package, sorted by selector
    pub fn dependencies_of(&self, selector: &PackageSelector) -> Vec<(&PackageNode, &DependencyEdge)> {
        self.neighbors(selector, Direction::Outgoing)
    }

    /// Packages that depend directly on `selector`, sorted by selector
    pub fn dependents_of(&self, selector: &PackageSelector) -> Vec<(&PackageNode, &DependencyEdge)> {
        self.neighbors(selector, Direction::Incoming)
    }

    fn neighbors(
        &self,
        selector: &PackageSelector,
        direction: Direction,
    ) -> Vec<(&PackageNode, &DependencyEdge)> {
        let Some(&idx) = self.node_map.get(selector) else {
            return Vec::new();
        };
        let mut found: Vec<(&PackageNode, &DependencyEdge)> = self
            .graph
            .edges_directed(idx, direction)
            .filter_map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                Some((self.graph.node_weight(other)?, edge.weight()))
            })
            .collect();
        found.sort_by(|a, b| a.0.selector.cmp(&b.0.selector));
        found
    }

    /// Get number of packages in the graph
    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get number of dependencies in the graph
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Render the graph from its roots as an indented tree.
    ///
    /// A package whose subtree was already printed is marked `(*)` and not
    /// expanded again, which also cuts cycles.
    pub fn render_tree(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut expanded = HashSet::new();
        for root in self.roots() {
            lines.push(format!("{} {}", root.selector, root.version));
            if expanded.insert(root.selector.clone()) {
                self.render_children(&root.selector, "", &mut expanded, &mut lines);
            }
        }
        lines
    }

    fn render_children(
        &self,
        selector: &PackageSelector,
        prefix: &str,
        expanded: &mut HashSet<PackageSelector>,
        lines: &mut Vec<String>,
    ) {
        let children = self.dependencies_of(selector);
        let count = children.len();
        for (i, (child, _edge)) in children.into_iter().enumerate() {
            let last = i + 1 == count;
            let branch = if last { "└── " } else { "├── " };
            let first_visit = expanded.insert(child.selector.clone());
            let marker = if first_visit { "" } else { " (*)" };
            lines.push(format!(
                "{}{}{} {}{}",
                prefix, branch, child.selector, child.version, marker
            ));
            if first_visit {
                let nested = format!("{}{}", prefix, if last { "    " } else { "│   " });
                self.render_children(&child.selector, &nested, expanded, lines);
            }
        }
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::solver::SolverStats;
    use proptest::prelude::*;
    use sprig_core::Dependency;
    use std::collections::BTreeMap;

    proptest! {
        #[test]
        fn every_reachable_package_is_rendered_once(
            num_packages in 1usize..7,
            edges in prop::collection::vec((0usize..6, 0usize..6), 0..15)
        ) {
            let name = |i: usize| PackageSelector::new(format!("pkg{}", i));
            let mut packages = BTreeMap::new();
            let mut dependencies: BTreeMap<PackageSelector, Vec<Dependency>> = BTreeMap::new();
            for i in 0..num_packages {
                packages.insert(name(i), Version::new(1, 0, i as u64));
                dependencies.insert(name(i), Vec::new());
            }
            for (from, to) in edges {
                if from < num_packages && to < num_packages {
                    if let Some(deps) = dependencies.get_mut(&name(from)) {
                        deps.push(Dependency::new(name(to), VersionRange::full()));
                    }
                }
            }
            let resolved = Resolution { packages, dependencies, stats: SolverStats::default() };
            let root = name(0);
            let graph = DependencyGraph::from_resolution(&resolved, [&root]);
            let lines = graph.render_tree();

            // Reachable set by plain traversal
            let mut reachable = HashSet::new();
            let mut stack = vec![root.clone()];
            while let Some(current) = stack.pop() {
                if reachable.insert(current.clone()) {
                    for (dep, _) in graph.dependencies_of(&current) {
                        stack.push(dep.selector.clone());
                    }
                }
            }

            let expanded: Vec<&String> = lines.iter().filter(|l| !l.ends_with("(*)")).collect();
            prop_assert_eq!(expanded.len(), reachable.len());
            for selector in &reachable {
                let label = format!("{} ", selector);
                prop_assert!(expanded.iter().any(|l| l.trim_start_matches(|c: char| !c.is_ascii_alphanumeric()).starts_with(&label)));
            }
        }
    }
}
