use crate::types::{DependencyGraph, RelationshipType};
use unitsplit_source_parser::{StructuralIndex, UnitKind};

/// Builds the unit dependency graph from a structural index
pub struct DependencyResolver;

impl DependencyResolver {
    /// Nodes are types and free functions in source order.
    ///
    /// Edges come from supertypes and used names that resolve to other
    /// definitions. Self-references are not edges.
    #[must_use]
    pub fn resolve(index: &StructuralIndex) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        let definitions: Vec<_> = index
            .units
            .iter()
            .filter(|unit| unit.kind.is_definition())
            .collect();

        for unit in &definitions {
            if let Some(name) = unit.name.as_deref() {
                graph.add_node(name);
            }
        }

        for unit in &definitions {
            let Some(name) = unit.name.as_deref() else {
                continue;
            };
            if unit.kind == UnitKind::TypeDefinition {
                for base in &unit.base_refs {
                    if base != name && graph.contains(base) {
                        graph.add_edge(name, base, RelationshipType::Extends);
                    }
                }
            }
            for used in &unit.used_names {
                if used != name && graph.contains(used) {
                    graph.add_edge(name, used, RelationshipType::Uses);
                }
            }
        }

        log::info!(
            "Built dependency graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use unitsplit_source_parser::SourceParser;

    fn resolve(code: &str) -> DependencyGraph {
        let index = SourceParser::new().unwrap().parse(code).unwrap();
        DependencyResolver::resolve(&index)
    }

    #[test]
    fn test_base_and_usage_edges() {
        let graph = resolve(
            "class Base:\n    pass\n\nclass Derived(Base):\n    def make(self):\n        return helper()\n\ndef helper():\n    return Base()\n",
        );

        assert_eq!(graph.names().collect::<Vec<_>>(), vec!["Base", "Derived", "helper"]);
        assert_eq!(
            graph.relationship("Derived", "Base"),
            Some(RelationshipType::Extends)
        );
        assert_eq!(graph.dependencies("Derived").unwrap(), vec!["Base", "helper"]);
        assert_eq!(graph.dependents("Base").unwrap(), vec!["Derived", "helper"]);
    }

    #[test]
    fn test_bindings_and_self_references_are_not_edges() {
        let graph = resolve(
            "LIMIT = 3\n\ndef count(n):\n    return count(n - 1) if n else LIMIT\n",
        );
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_cycle_between_type_and_function() {
        let graph = resolve(
            "class A:\n    def go(self):\n        return f(self)\n\ndef f(a):\n    return isinstance(a, A)\n",
        );
        assert_eq!(graph.detect_cycles(), vec![vec!["A", "f"]]);
        assert!(graph.would_create_cycle("A", "f"));
        assert!(graph.would_create_cycle("f", "A"));
    }
}
