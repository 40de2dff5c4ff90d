//! Serializable node/edge lists derived from the trie.

use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// A trie node as exported to snapshots.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphNode {
    /// Creation-order id; the root is 0.
    pub id: usize,
    /// Distance from the root.
    pub depth: usize,
}

/// A parent-to-child link.
///
/// In the uncompressed graph `ch` is a single symbol. In the compressed graph
/// it is the concatenation of every symbol on a fused chain.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: usize,
    pub to: usize,
    pub ch: String,
    /// Number of ingested sequences that took this edge.
    pub count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<f64>,
}

/// Node and edge lists of either the plain or the compressed trie.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl GraphData {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Deepest node depth, 0 for an empty or root-only graph.
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }

    /// Convert to petgraph StableDiGraph for analysis.
    /// Returns the graph and a mapping from node id to NodeIndex.
    pub fn to_petgraph(&self) -> (StableDiGraph<GraphNode, GraphEdge>, HashMap<usize, NodeIndex>) {
        let mut graph = StableDiGraph::new();
        let mut id_to_index = HashMap::new();

        for node in &self.nodes {
            let idx = graph.add_node(*node);
            id_to_index.insert(node.id, idx);
        }

        for edge in &self.edges {
            if let (Some(&from_idx), Some(&to_idx)) =
                (id_to_index.get(&edge.from), id_to_index.get(&edge.to))
            {
                graph.add_edge(from_idx, to_idx, edge.clone());
            }
        }

        (graph, id_to_index)
    }

    /// Nodes without outgoing edges, i.e. places where sequences ended.
    pub fn leaf_count(&self) -> usize {
        let (graph, _) = self.to_petgraph();
        graph
            .node_indices()
            .filter(|&idx| {
                graph
                    .neighbors_directed(idx, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .count()
    }
}
