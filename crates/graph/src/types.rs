use crate::error::{GraphError, Result};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type of relationship between units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    /// A declares B as a supertype
    Extends,

    /// A references B in its body
    Uses,
}

/// Directed graph of name → referenced name.
///
/// Node order is insertion order, which callers keep equal to source order;
/// every query breaks ties by it.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub(crate) graph: DiGraph<String, RelationshipType>,
    pub(crate) index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from names and `(from, to)` pairs; unknown endpoints are added
    pub fn from_edges<'a, N, E>(nodes: N, edges: E) -> Self
    where
        N: IntoIterator<Item = &'a str>,
        E: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut graph = Self::new();
        for node in nodes {
            graph.add_node(node);
        }
        for (from, to) in edges {
            graph.add_edge(from, to, RelationshipType::Uses);
        }
        graph
    }

    /// Add a node; known names return their existing index
    pub fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(idx) = self.index.get(name) {
            return *idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Add an edge; a repeated edge keeps one entry, preferring `Extends`
    pub fn add_edge(&mut self, from: &str, to: &str, relationship: RelationshipType) {
        let from_idx = self.add_node(from);
        let to_idx = self.add_node(to);
        match self.graph.find_edge(from_idx, to_idx) {
            Some(edge) => {
                if relationship == RelationshipType::Extends {
                    self.graph[edge] = relationship;
                }
            }
            None => {
                self.graph.add_edge(from_idx, to_idx, relationship);
            }
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.graph.node_indices().map(|idx| self.graph[idx].as_str())
    }

    #[must_use]
    pub fn relationship(&self, from: &str, to: &str) -> Option<RelationshipType> {
        let edge = self.graph.find_edge(*self.index.get(from)?, *self.index.get(to)?)?;
        Some(self.graph[edge])
    }

    /// All `(from, to)` pairs, ordered by source then target
    #[must_use]
    pub fn edges(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(NodeIndex, NodeIndex)> = self
            .graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(from, to)| (self.graph[from].as_str(), self.graph[to].as_str()))
            .collect()
    }

    pub(crate) fn node(&self, name: &str) -> Result<NodeIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_edge_is_merged() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("Derived", "Base", RelationshipType::Uses);
        graph.add_edge("Derived", "Base", RelationshipType::Extends);
        graph.add_edge("Derived", "Base", RelationshipType::Uses);

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(
            graph.relationship("Derived", "Base"),
            Some(RelationshipType::Extends)
        );
        assert_eq!(graph.names().collect::<Vec<_>>(), vec!["Derived", "Base"]);
    }

    #[test]
    fn test_from_edges_keeps_node_order() {
        let graph = DependencyGraph::from_edges(["a", "b", "c"], [("c", "a"), ("a", "b")]);
        assert_eq!(graph.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(graph.edges(), vec![("a", "b"), ("c", "a")]);
        assert!(graph.node("missing").is_err());
    }
}
