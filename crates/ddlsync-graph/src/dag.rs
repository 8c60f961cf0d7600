//! Dependency graph construction and traversal
//!
//! Builds forward and reverse edges between artifact keys for impact
//! analysis. Edges are keyed by artifact key; artifacts never hold references
//! to one another.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use ddlsync_core::{Artifact, ArtifactKind};

/// Node identifier (artifact key)
pub type NodeId = String;

/// Artifact keys linked by their resolved dependencies, in both directions
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Forward edges: node -> nodes it depends on (parents)
    parents: HashMap<NodeId, Vec<NodeId>>,

    /// Reverse edges: node -> nodes that depend on it (children)
    children: HashMap<NodeId, Vec<NodeId>>,

    /// All nodes in the graph
    nodes: BTreeSet<NodeId>,

    /// Dependencies that matched no artifact, as "KIND:name"
    external: BTreeSet<String>,
}

impl DependencyGraph {
    /// Build a graph over a set of artifacts of any kinds
    ///
    /// A dependency resolves by (kind, name); an unmatched dependency is
    /// recorded as external and produces no edge.
    pub fn from_artifacts<'a>(artifacts: impl IntoIterator<Item = &'a Artifact>) -> Self {
        let artifacts: Vec<&Artifact> = artifacts.into_iter().collect();
        let by_name: HashMap<(ArtifactKind, &str), &str> = artifacts
            .iter()
            .map(|a| ((a.kind, a.name.as_str()), a.key.as_str()))
            .collect();

        let mut graph = Self::default();

        for artifact in &artifacts {
            graph.nodes.insert(artifact.key.clone());

            for dependency in &artifact.dependencies {
                match by_name.get(&(dependency.kind, dependency.name.as_str())) {
                    Some(parent_key) => {
                        let parents = graph.parents.entry(artifact.key.clone()).or_default();
                        if !parents.iter().any(|p| p == parent_key) {
                            parents.push(parent_key.to_string());
                            graph
                                .children
                                .entry(parent_key.to_string())
                                .or_default()
                                .push(artifact.key.clone());
                        }
                    }
                    None => {
                        graph
                            .external
                            .insert(format!("{}:{}", dependency.kind.tag(), dependency.name));
                    }
                }
            }
        }

        graph
    }

    /// Every artifact key, sorted
    pub fn all_nodes(&self) -> Vec<&NodeId> {
        self.nodes.iter().collect()
    }

    /// Dependencies that resolved to no artifact in the graph
    pub fn external(&self) -> Vec<&String> {
        self.external.iter().collect()
    }

    /// Keys this artifact depends on directly
    pub fn parents(&self, node_id: &str) -> Vec<&NodeId> {
        self.parents
            .get(node_id)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// Keys that depend on this artifact directly
    pub fn children(&self, node_id: &str) -> Vec<&NodeId> {
        self.children
            .get(node_id)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// Everything that would break if this artifact went away
    pub fn downstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::closure(&self.children, node_id)
    }

    /// Everything this artifact needs, directly or not
    pub fn upstream(&self, node_id: &str) -> Vec<NodeId> {
        Self::closure(&self.parents, node_id)
    }

    /// Whether `source` reaches `target` through dependents
    pub fn has_path(&self, source: &str, target: &str) -> bool {
        self.downstream(source).iter().any(|n| n == target)
    }

    /// Breadth-first transitive closure over one edge direction
    fn closure(edges: &HashMap<NodeId, Vec<NodeId>>, node_id: &str) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        let mut result = Vec::new();

        if let Some(next) = edges.get(node_id) {
            queue.extend(next.iter().cloned());
        }

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            result.push(current.clone());

            if let Some(next) = edges.get(&current) {
                for node in next {
                    if !visited.contains(node) {
                        queue.push_back(node.clone());
                    }
                }
            }
        }

        result
    }
}
