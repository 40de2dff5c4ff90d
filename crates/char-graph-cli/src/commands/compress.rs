//! Compress command implementation.
//!
//! Rebuilds the trie from a snapshot's successful runs and swaps its graph
//! for the path-compressed form. Everything else is copied unchanged.

use std::path::Path;

use anyhow::{Context, Result};
use char_graph_collector::{read_snapshot, write_snapshot};
use char_graph_core::TrieAggregator;
use tracing::debug;

/// Edge counts before and after compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionReport {
    pub original_edges: usize,
    pub compressed_edges: usize,
    pub compressed_nodes: usize,
}

/// Execute the compress command.
pub fn execute(input: &Path, output: &Path) -> Result<CompressionReport> {
    let mut snapshot = read_snapshot(input)
        .with_context(|| format!("Failed to load snapshot {}", input.display()))?;

    let mut aggregator = TrieAggregator::new();
    let ingested = aggregator.load_from_runs(&snapshot.runs);
    debug!(ingested = ingested, nodes = aggregator.node_count(), "trie_rebuilt");

    let original_edges = snapshot.graph.edge_count();
    snapshot.graph = aggregator.compressed_graph_data();

    let report = CompressionReport {
        original_edges,
        compressed_edges: snapshot.graph.edge_count(),
        compressed_nodes: snapshot.graph.node_count(),
    };

    write_snapshot(&snapshot, output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("🗜️  Compressed {}", input.display());
    println!("   Edges: {} → {}", report.original_edges, report.compressed_edges);
    println!("   Nodes: {}", report.compressed_nodes);
    println!("💾 Saved to: {}", output.display());

    Ok(report)
}
