//! Mermaid command implementation.
//!
//! Emits a left-to-right flowchart with one line per edge:
//!
//! ```text
//! graph LR
//!     node0 -- "H (2)" --> node1
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use char_graph_collector::read_snapshot;
use char_graph_core::GraphData;

/// Edge label text: newline and a lone space get visible stand-ins.
pub fn edge_label(ch: &str) -> String {
    match ch {
        "\n" => "\\n".to_string(),
        " " => "(space)".to_string(),
        other => other.replace('"', "#quot;"),
    }
}

/// Render the edges of `graph` as a Mermaid document.
pub fn render(graph: &GraphData) -> String {
    let mut lines = vec!["graph LR".to_string()];
    lines.extend(graph.edges.iter().map(|edge| {
        format!(
            "    node{} -- \"{} ({})\" --> node{}",
            edge.from,
            edge_label(&edge.ch),
            edge.count,
            edge.to
        )
    }));
    lines.join("\n")
}

/// Execute the mermaid command.
pub fn execute(path: &Path, output: Option<&Path>) -> Result<()> {
    let snapshot = read_snapshot(path)
        .with_context(|| format!("Failed to load snapshot {}", path.display()))?;
    let document = render(&snapshot.graph);

    match output {
        Some(output) => {
            std::fs::write(output, format!("{document}\n"))
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("💾 Saved to: {}", output.display());
        }
        None => println!("{document}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use char_graph_core::TrieAggregator;

    #[test]
    fn test_labels() {
        assert_eq!(edge_label("\n"), "\\n");
        assert_eq!(edge_label(" "), "(space)");
        assert_eq!(edge_label("a b"), "a b");
        assert_eq!(edge_label("\""), "#quot;");
    }

    #[test]
    fn test_render_edges() {
        let mut trie = TrieAggregator::new();
        trie.add_text("a ");
        trie.add_text("a\n");

        let doc = render(&trie.graph_data());
        let lines: Vec<&str> = doc.lines().collect();

        assert_eq!(lines[0], "graph LR");
        assert_eq!(lines.len(), 4);
        assert!(lines.contains(&"    node0 -- \"a (2)\" --> node1"));
        assert!(lines.iter().any(|l| l.contains("\"(space) (1)\"")));
        assert!(lines.iter().any(|l| l.contains("\"\\n (1)\"")));
    }

    #[test]
    fn test_render_empty_graph() {
        assert_eq!(render(&GraphData::default()), "graph LR");
    }
}
