//! Arena-backed prefix trie over sampled outputs.
//!
//! Nodes live in a `Vec` and refer to their children by index, so the trie is
//! acyclic by construction (depth strictly increases along every edge). Nodes
//! are only ever appended; compression and statistics are derived views.

use std::collections::BTreeMap;

use crate::graph::{GraphData, GraphEdge, GraphNode};
use crate::record::RunRecord;

/// Outgoing link of a trie node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieEdge {
    /// Arena index (and id) of the child node.
    pub child: usize,
    /// Number of times this edge was traversed. Always >= 1.
    pub count: u64,
}

/// A single node of the trie.
///
/// Children and traversal counts share one map, so both always have the same
/// key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieNode {
    id: usize,
    depth: usize,
    edges: BTreeMap<String, TrieEdge>,
}

impl TrieNode {
    fn new(id: usize, depth: usize) -> Self {
        Self {
            id,
            depth,
            edges: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Outgoing edges ordered by symbol.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &TrieEdge)> {
        self.edges.iter().map(|(symbol, edge)| (symbol.as_str(), edge))
    }

    pub fn child_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.edges.is_empty()
    }

    /// Traversal count of the edge labelled `symbol`.
    pub fn count(&self, symbol: &str) -> Option<u64> {
        self.edges.get(symbol).map(|edge| edge.count)
    }

    pub fn child(&self, symbol: &str) -> Option<usize> {
        self.edges.get(symbol).map(|edge| edge.child)
    }

    /// The only outgoing edge, if the node has exactly one.
    pub fn sole_edge(&self) -> Option<(&str, &TrieEdge)> {
        if self.edges.len() == 1 {
            self.edges().next()
        } else {
            None
        }
    }
}

/// Owns the growing trie for one collection run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieAggregator {
    nodes: Vec<TrieNode>,
}

impl Default for TrieAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl TrieAggregator {
    /// Create an aggregator holding only the root (id 0, depth 0).
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::new(0, 0)],
        }
    }

    pub fn root(&self) -> &TrieNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: usize) -> Option<&TrieNode> {
        self.nodes.get(id)
    }

    /// All nodes in creation order (index == id).
    pub fn nodes(&self) -> &[TrieNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every non-root node has exactly one incoming edge.
    pub fn edge_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Ingest one output string, one character per symbol.
    pub fn add_text(&mut self, text: &str) {
        let mut current = 0;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            current = self.step(current, ch.encode_utf8(&mut buf));
        }
    }

    /// Ingest a pre-tokenized sequence; each token is one symbol.
    pub fn add_tokens<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current = 0;
        for token in tokens {
            current = self.step(current, token.as_ref());
        }
    }

    /// Ingest the text of every `ok` record, in input order.
    ///
    /// Returns the number of records ingested.
    pub fn load_from_runs<'a, I>(&mut self, records: I) -> usize
    where
        I: IntoIterator<Item = &'a RunRecord>,
    {
        let mut loaded = 0;
        for record in records.into_iter().filter(|r| r.is_ok()) {
            self.add_text(&record.text);
            loaded += 1;
        }
        loaded
    }

    /// Follow (or create) the edge `symbol` out of `parent` and bump its count.
    fn step(&mut self, parent: usize, symbol: &str) -> usize {
        if let Some(edge) = self.nodes[parent].edges.get_mut(symbol) {
            edge.count += 1;
            return edge.child;
        }

        let child = self.nodes.len();
        let depth = self.nodes[parent].depth + 1;
        self.nodes.push(TrieNode::new(child, depth));
        self.nodes[parent]
            .edges
            .insert(symbol.to_owned(), TrieEdge { child, count: 1 });
        child
    }

    /// Uncompressed node and edge lists, one edge per parent/child link.
    pub fn graph_data(&self) -> GraphData {
        let nodes = self
            .nodes
            .iter()
            .map(|node| GraphNode {
                id: node.id,
                depth: node.depth,
            })
            .collect();

        let edges = self
            .nodes
            .iter()
            .flat_map(|node| {
                node.edges().map(move |(symbol, edge)| GraphEdge {
                    from: node.id,
                    to: edge.child,
                    ch: symbol.to_string(),
                    count: edge.count,
                    p: None,
                })
            })
            .collect();

        GraphData { nodes, edges }
    }
}
