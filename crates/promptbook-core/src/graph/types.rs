//! Cell-to-cell dependency graph.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

/// Directed graph between cells by position: an edge `p → c` means an earlier
/// cell `p` produces a key that the later cell `c` reads.
///
/// Built from the last recorded dependency and produce sets, so it describes
/// the most recent run. It is never used to reorder execution.
pub struct DependencyGraph {
    graph: DiGraph<usize, ()>,
    nodes: Vec<NodeIndex>,
}

impl DependencyGraph {
    /// Build from `(dependencies, produces)` pairs in notebook order.
    pub fn build<'a, I>(cells: I) -> Self
    where
        I: IntoIterator<Item = (&'a BTreeSet<String>, &'a BTreeSet<String>)>,
    {
        let cells: Vec<_> = cells.into_iter().collect();
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = (0..cells.len()).map(|i| graph.add_node(i)).collect();

        for (consumer, (dependencies, _)) in cells.iter().enumerate() {
            for (producer, (_, produces)) in cells.iter().enumerate().take(consumer) {
                if !produces.is_disjoint(dependencies) {
                    graph.add_edge(nodes[producer], nodes[consumer], ());
                }
            }
        }

        Self { graph, nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn neighbors(&self, index: usize, direction: Direction) -> BTreeSet<usize> {
        match self.nodes.get(index) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, direction)
                .map(|n| self.graph[n])
                .collect(),
            None => BTreeSet::new(),
        }
    }

    /// Earlier cells whose output the cell at `index` reads.
    pub fn dependencies_of(&self, index: usize) -> BTreeSet<usize> {
        self.neighbors(index, Direction::Incoming)
    }

    /// Later cells that read output of the cell at `index`.
    pub fn dependents_of(&self, index: usize) -> BTreeSet<usize> {
        self.neighbors(index, Direction::Outgoing)
    }

    /// Every cell mapped to the cells it depends on.
    pub fn to_map(&self) -> BTreeMap<usize, BTreeSet<usize>> {
        (0..self.len()).map(|i| (i, self.dependencies_of(i))).collect()
    }

    /// All `(producer, consumer)` edges, sorted.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (self.graph[a], self.graph[b]))
            .collect();
        edges.sort_unstable();
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> BTreeSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_edges_follow_produce_and_read() {
        let cells = [
            (set(&[]), set(&["x"])),
            (set(&["x"]), set(&["y"])),
            (set(&["x", "y"]), set(&[])),
        ];
        let graph = DependencyGraph::build(cells.iter().map(|(d, p)| (d, p)));

        assert_eq!(graph.edges(), vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(graph.dependencies_of(2), BTreeSet::from([0, 1]));
        assert_eq!(graph.dependents_of(0), BTreeSet::from([1, 2]));
        assert!(graph.dependencies_of(0).is_empty());
    }

    #[test]
    fn test_later_producers_are_ignored() {
        let cells = [(set(&["x"]), set(&[])), (set(&[]), set(&["x"]))];
        let graph = DependencyGraph::build(cells.iter().map(|(d, p)| (d, p)));
        assert!(graph.edges().is_empty());
        assert_eq!(graph.to_map().len(), 2);
    }

    #[test]
    fn test_out_of_range_index() {
        let graph = DependencyGraph::build(std::iter::empty());
        assert!(graph.is_empty());
        assert!(graph.dependents_of(5).is_empty());
    }
}
