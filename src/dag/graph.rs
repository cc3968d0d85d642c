// src/dag/graph.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{CatinError, Result};
use crate::task::TaskName;

/// Internal node structure: stores immediate deps and dependents as arena
/// indices.
#[derive(Debug, Clone)]
struct GraphNode {
    name: TaskName,
    /// Direct dependencies: nodes that must succeed before this one can run.
    deps: Vec<usize>,
    /// Direct dependents: nodes that depend on this one.
    dependents: Vec<usize>,
}

/// Arena-backed DAG over the members of a task group.
///
/// Node `i` is member `i` of the owning group. An edge `(a, b)` means
/// "`b` depends on `a`". Acyclicity is checked once, in [`TaskGraph::new`].
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: Vec<GraphNode>,
}

impl TaskGraph {
    /// Build a graph over `names` from `(dependency, dependent)` index pairs.
    ///
    /// Fails with [`CatinError::GraphCycle`] if the edges contain a cycle
    /// (self-loops included) and with [`CatinError::ConfigError`] if an edge
    /// refers to a node that does not exist.
    pub fn new(names: Vec<TaskName>, edges: &[(usize, usize)]) -> Result<Self> {
        let mut nodes: Vec<GraphNode> = names
            .into_iter()
            .map(|name| GraphNode {
                name,
                deps: Vec::new(),
                dependents: Vec::new(),
            })
            .collect();

        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        for &(from, to) in edges {
            if from >= nodes.len() || to >= nodes.len() {
                return Err(CatinError::ConfigError(format!(
                    "edge ({from}, {to}) refers to a task outside the group of {} task(s)",
                    nodes.len()
                )));
            }
            if !seen.insert((from, to)) {
                continue;
            }
            nodes[to].deps.push(from);
            nodes[from].dependents.push(to);
        }

        let graph = Self { nodes };
        graph.ensure_acyclic()?;
        Ok(graph)
    }

    fn ensure_acyclic(&self) -> Result<()> {
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();

        for idx in 0..self.nodes.len() {
            graph.add_node(idx);
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            for &dep in &node.deps {
                graph.add_edge(dep, idx, ());
            }
        }

        // A topological sort will fail if there is a cycle.
        match toposort(&graph, None) {
            Ok(_order) => Ok(()),
            Err(cycle) => {
                let node = cycle.node_id();
                Err(CatinError::GraphCycle(format!(
                    "cycle detected in task graph involving task '{}'",
                    self.nodes[node].name
                )))
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Immediate dependencies of node `idx`.
    pub fn dependencies_of(&self, idx: usize) -> &[usize] {
        self.nodes
            .get(idx)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of node `idx`.
    pub fn dependents_of(&self, idx: usize) -> &[usize] {
        self.nodes
            .get(idx)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}
