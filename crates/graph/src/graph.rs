use crate::error::Result;
use crate::types::DependencyGraph;
use petgraph::algo::{has_path_connecting, tarjan_scc};
use petgraph::graph::NodeIndex;
use petgraph::Direction;

impl DependencyGraph {
    /// Names that `name` references directly, in source order
    pub fn dependencies(&self, name: &str) -> Result<Vec<&str>> {
        let node = self.node(name)?;
        Ok(self.names_of(self.sorted_neighbors(node, Direction::Outgoing)))
    }

    /// Names that reference `name` directly, in source order
    pub fn dependents(&self, name: &str) -> Result<Vec<&str>> {
        let node = self.node(name)?;
        Ok(self.names_of(self.sorted_neighbors(node, Direction::Incoming)))
    }

    /// Report cycles found by a depth-first walk over the active path.
    ///
    /// Every back-edge yields the path slice from its target to the current
    /// node. Self-loops are ignored.
    #[must_use]
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let mut search = CycleSearch {
            graph: self,
            visited: vec![false; self.graph.node_count()],
            on_stack: vec![false; self.graph.node_count()],
            stack: Vec::new(),
            cycles: Vec::new(),
        };
        for node in self.graph.node_indices() {
            if !search.visited[node.index()] {
                search.visit(node);
            }
        }
        search.cycles
    }

    /// Dependencies-first order that never fails on cycles.
    ///
    /// Members of a cyclic group are emitted together in source order.
    #[must_use]
    pub fn load_order(&self) -> Vec<String> {
        let mut groups = tarjan_scc(&self.graph);
        for group in &mut groups {
            group.sort();
        }
        let mut component = vec![0; self.graph.node_count()];
        for (id, group) in groups.iter().enumerate() {
            for member in group {
                component[member.index()] = id;
            }
        }

        let mut search = OrderSearch {
            graph: self,
            emitted: vec![false; groups.len()],
            on_stack: vec![false; groups.len()],
            groups: &groups,
            component: &component,
            order: Vec::new(),
        };
        for node in self.graph.node_indices() {
            search.visit(component[node.index()]);
        }
        search.order
    }

    /// Would an edge `from → to` close a cycle, i.e. does `to` already reach `from`?
    #[must_use]
    pub fn would_create_cycle(&self, from: &str, to: &str) -> bool {
        let (Some(from_idx), Some(to_idx)) = (self.index.get(from), self.index.get(to)) else {
            return false;
        };
        from_idx == to_idx || has_path_connecting(&self.graph, *to_idx, *from_idx, None)
    }

    /// Strongly connected groups with more than one member, in source order
    #[must_use]
    pub fn mutual_groups(&self) -> Vec<Vec<String>> {
        let mut groups: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|group| group.len() > 1)
            .collect();
        for group in &mut groups {
            group.sort();
        }
        groups.sort();
        groups
            .into_iter()
            .map(|group| group.into_iter().map(|n| self.graph[n].clone()).collect())
            .collect()
    }

    fn sorted_neighbors(&self, node: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut neighbors: Vec<NodeIndex> = self.graph.neighbors_directed(node, direction).collect();
        neighbors.sort();
        neighbors.dedup();
        neighbors
    }

    fn names_of(&self, nodes: Vec<NodeIndex>) -> Vec<&str> {
        nodes.into_iter().map(|n| self.graph[n].as_str()).collect()
    }
}

struct CycleSearch<'g> {
    graph: &'g DependencyGraph,
    visited: Vec<bool>,
    on_stack: Vec<bool>,
    stack: Vec<NodeIndex>,
    cycles: Vec<Vec<String>>,
}

impl CycleSearch<'_> {
    fn visit(&mut self, node: NodeIndex) {
        self.visited[node.index()] = true;
        self.on_stack[node.index()] = true;
        self.stack.push(node);

        for next in self.graph.sorted_neighbors(node, Direction::Outgoing) {
            if next == node {
                continue;
            }
            if self.on_stack[next.index()] {
                if let Some(pos) = self.stack.iter().position(|n| *n == next) {
                    let cycle = self.stack[pos..]
                        .iter()
                        .map(|n| self.graph.graph[*n].clone())
                        .collect();
                    self.cycles.push(cycle);
                }
            } else if !self.visited[next.index()] {
                self.visit(next);
            }
        }

        self.stack.pop();
        self.on_stack[node.index()] = false;
    }
}

struct OrderSearch<'g> {
    graph: &'g DependencyGraph,
    groups: &'g [Vec<NodeIndex>],
    component: &'g [usize],
    emitted: Vec<bool>,
    on_stack: Vec<bool>,
    order: Vec<String>,
}

impl OrderSearch<'_> {
    fn visit(&mut self, id: usize) {
        // Re-entry while on the stack is skipped rather than treated as an error
        if self.emitted[id] || self.on_stack[id] {
            return;
        }
        self.on_stack[id] = true;

        let mut deps: Vec<NodeIndex> = self.groups[id]
            .iter()
            .flat_map(|member| self.graph.sorted_neighbors(*member, Direction::Outgoing))
            .collect();
        deps.sort();
        deps.dedup();
        for dep in deps {
            let dep_id = self.component[dep.index()];
            if dep_id != id {
                self.visit(dep_id);
            }
        }

        self.on_stack[id] = false;
        self.emitted[id] = true;
        let names: Vec<String> = self.groups[id]
            .iter()
            .map(|member| self.graph.graph[*member].clone())
            .collect();
        self.order.extend(names);
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{DependencyGraph, RelationshipType};
    use pretty_assertions::assert_eq;

    fn graph(nodes: &[&'static str], edges: &[(&'static str, &'static str)]) -> DependencyGraph {
        DependencyGraph::from_edges(nodes.iter().copied(), edges.iter().copied())
    }

    #[test]
    fn test_load_order_puts_dependencies_first() {
        let g = graph(&["Derived", "Base", "main"], &[("Derived", "Base"), ("main", "Derived")]);
        assert_eq!(g.load_order(), vec!["Base", "Derived", "main"]);
    }

    #[test]
    fn test_load_order_keeps_source_order_inside_cycles() {
        let g = graph(&["A", "X", "f"], &[("A", "f"), ("f", "A"), ("A", "X")]);
        assert_eq!(g.load_order(), vec!["X", "A", "f"]);
    }

    #[test]
    fn test_detect_cycles_reports_active_path() {
        let g = graph(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("C", "A")]);
        assert_eq!(g.detect_cycles(), vec![vec!["A", "B", "C"]]);
    }

    #[test]
    fn test_self_loop_is_not_a_cycle() {
        let mut g = DependencyGraph::new();
        g.add_edge("Node", "Node", RelationshipType::Uses);
        assert!(g.detect_cycles().is_empty());
        assert!(g.mutual_groups().is_empty());
        assert!(g.would_create_cycle("Node", "Node"));
    }

    #[test]
    fn test_would_create_cycle_is_reachability() {
        let g = graph(&["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        assert!(g.would_create_cycle("C", "A"));
        assert!(!g.would_create_cycle("A", "C"));
        assert!(!g.would_create_cycle("A", "unknown"));
    }

    #[test]
    fn test_dependents_index() {
        let g = graph(&["Base", "Left", "Right"], &[("Left", "Base"), ("Right", "Base")]);
        assert_eq!(g.dependents("Base").unwrap(), vec!["Left", "Right"]);
        assert_eq!(g.dependencies("Left").unwrap(), vec!["Base"]);
        assert!(g.dependents("Missing").is_err());
    }

    #[test]
    fn test_mutual_groups() {
        let g = graph(
            &["a", "b", "c", "d"],
            &[("b", "a"), ("a", "b"), ("c", "d")],
        );
        assert_eq!(g.mutual_groups(), vec![vec!["a", "b"]]);
    }
}
