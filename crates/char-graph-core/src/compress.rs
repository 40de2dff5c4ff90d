//! Path compression (radix view) of the trie.

use crate::graph::{GraphData, GraphEdge, GraphNode};
use crate::trie::TrieAggregator;

impl TrieAggregator {
    /// Derive a radix-tree view that fuses single-child chains into one edge.
    ///
    /// A chain keeps growing while the next node has exactly one child and
    /// that child's edge carries the same traversal count as the first edge
    /// of the chain. A differing count means some sequences ended inside the
    /// chain, so that node is kept. The root is always kept. Node ids are the
    /// ids of the underlying trie nodes; the trie itself is not modified.
    pub fn compressed_graph_data(&self) -> GraphData {
        let root = self.root();
        let mut nodes = vec![GraphNode {
            id: root.id(),
            depth: root.depth(),
        }];
        let mut edges = Vec::new();
        let mut stack = vec![root.id()];

        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current) else {
                continue;
            };

            for (symbol, edge) in node.edges() {
                let mut label = symbol.to_string();
                let count = edge.count;
                let mut end = edge.child;

                while let Some((next_symbol, next_edge)) =
                    self.node(end).and_then(|n| n.sole_edge())
                {
                    if next_edge.count != count {
                        break;
                    }
                    label.push_str(next_symbol);
                    end = next_edge.child;
                }

                let depth = self.node(end).map(|n| n.depth()).unwrap_or_default();
                nodes.push(GraphNode { id: end, depth });
                stack.push(end);
                edges.push(GraphEdge {
                    from: current,
                    to: end,
                    ch: label,
                    count,
                    p: None,
                });
            }
        }

        GraphData { nodes, edges }
    }
}
