//! Inspect command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use char_graph_collector::read_snapshot;
use char_graph_core::DepthStatistic;

/// Printable form of a symbol: control characters are escaped.
pub fn display_symbol(symbol: &str) -> String {
    symbol.escape_debug().to_string()
}

fn top_symbols(stat: &DepthStatistic) -> String {
    stat.top_symbols
        .iter()
        .map(|top| format!("'{}' {:.2}", display_symbol(&top.symbol), top.p))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Execute the inspect command.
pub fn execute(path: &Path) -> Result<()> {
    let snapshot = read_snapshot(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    let totals = &snapshot.stats.totals;
    let graph = &snapshot.graph;

    println!("📊 Snapshot {}", path.display());
    println!("{:─<50}", "");
    println!();
    println!("🤖 Model:      {}", snapshot.config.model);
    println!("💬 Prompt:     {:?}", snapshot.config.prompt);
    println!("🕐 Run id:     {}", snapshot.meta.run_id);
    println!();
    println!("📦 Runs:       {} ok, {} error", totals.ok, totals.error);
    println!("🔤 Characters: {}", totals.total_chars);
    println!();
    println!("🌳 Graph:");
    println!("   Nodes:      {}", graph.node_count());
    println!("   Edges:      {}", graph.edge_count());
    println!("   Leaves:     {}", graph.leaf_count());
    println!("   Max depth:  {}", graph.max_depth());

    if snapshot.stats.depth_stats.is_empty() {
        return Ok(());
    }

    println!();
    println!(
        "{:>5}  {:>6}  {:>6}  {:>7}  top",
        "depth", "total", "unique", "entropy"
    );
    for stat in &snapshot.stats.depth_stats {
        println!(
            "{:>5}  {:>6}  {:>6}  {:>7.3}  {}",
            stat.depth,
            stat.total_transitions,
            stat.unique_symbols,
            stat.entropy_bits,
            top_symbols(stat)
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use char_graph_core::TopSymbol;

    #[test]
    fn test_display_symbol_escapes_controls() {
        assert_eq!(display_symbol("\n"), "\\n");
        assert_eq!(display_symbol("a"), "a");
    }

    #[test]
    fn test_top_symbols_line() {
        let stat = DepthStatistic {
            depth: 0,
            total_transitions: 4,
            unique_symbols: 2,
            top_symbols: vec![
                TopSymbol {
                    symbol: "a".into(),
                    count: 3,
                    p: 0.75,
                },
                TopSymbol {
                    symbol: "\t".into(),
                    count: 1,
                    p: 0.25,
                },
            ],
            entropy_bits: 0.811,
        };
        assert_eq!(top_symbols(&stat), "'a' 0.75, '\\t' 0.25");
    }
}
