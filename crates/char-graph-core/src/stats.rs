//! Per-depth distribution statistics over the uncompressed trie.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::trie::{TrieAggregator, TrieNode};

/// Number of most frequent symbols reported per depth.
pub const TOP_SYMBOLS: usize = 5;

/// A frequent symbol at some depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSymbol {
    #[serde(rename = "ch")]
    pub symbol: String,
    pub count: u64,
    /// `count / total_transitions` at that depth.
    pub p: f64,
}

/// Summary of the symbols emitted from every node at one depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthStatistic {
    pub depth: usize,
    pub total_transitions: u64,
    #[serde(rename = "unique_chars", alias = "unique_symbols")]
    pub unique_symbols: usize,
    #[serde(rename = "top_chars", alias = "top_symbols", default)]
    pub top_symbols: Vec<TopSymbol>,
    pub entropy_bits: f64,
}

/// Shannon entropy in bits of the distribution given by `counts`.
pub fn entropy_bits<I>(counts: I, total: u64) -> f64
where
    I: IntoIterator<Item = u64>,
{
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    let bits: f64 = counts
        .into_iter()
        .filter(|&count| count > 0)
        .map(|count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum();
    // A single symbol yields -0.0.
    if bits > 0.0 {
        bits
    } else {
        0.0
    }
}

impl TrieAggregator {
    /// One entry per depth that has at least one outgoing transition.
    pub fn depth_statistics(&self) -> Vec<DepthStatistic> {
        let mut by_depth: BTreeMap<usize, Vec<&TrieNode>> = BTreeMap::new();
        for node in self.nodes() {
            by_depth.entry(node.depth()).or_default().push(node);
        }

        by_depth
            .into_iter()
            .filter_map(|(depth, nodes)| depth_statistic(depth, &nodes))
            .collect()
    }
}

fn depth_statistic(depth: usize, nodes: &[&TrieNode]) -> Option<DepthStatistic> {
    // First-seen order, so the stable sort below breaks ties deterministically.
    let mut symbols: Vec<(&str, u64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for node in nodes {
        for (symbol, edge) in node.edges() {
            match index.get(symbol) {
                Some(&i) => symbols[i].1 += edge.count,
                None => {
                    index.insert(symbol, symbols.len());
                    symbols.push((symbol, edge.count));
                }
            }
        }
    }

    let total: u64 = symbols.iter().map(|(_, count)| count).sum();
    if total == 0 {
        return None;
    }

    let entropy = entropy_bits(symbols.iter().map(|(_, count)| *count), total);

    let mut ranked = symbols.clone();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let top_symbols = ranked
        .into_iter()
        .take(TOP_SYMBOLS)
        .map(|(symbol, count)| TopSymbol {
            symbol: symbol.to_string(),
            count,
            p: count as f64 / total as f64,
        })
        .collect();

    Some(DepthStatistic {
        depth,
        total_transitions: total,
        unique_symbols: symbols.len(),
        top_symbols,
        entropy_bits: entropy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(texts: &[&str]) -> TrieAggregator {
        let mut trie = TrieAggregator::new();
        for text in texts {
            trie.add_text(text);
        }
        trie
    }

    #[test]
    fn test_example_distribution() {
        let stats = build(&["ab", "ac", "ab"]).depth_statistics();
        assert_eq!(stats.len(), 2);

        // Depth 0 holds the transitions into the first character.
        assert_eq!(stats[0].depth, 0);
        assert_eq!(stats[0].total_transitions, 3);
        assert_eq!(stats[0].unique_symbols, 1);
        assert_eq!(stats[0].entropy_bits, 0.0);

        let expected = -((2.0f64 / 3.0) * (2.0f64 / 3.0).log2() + (1.0 / 3.0) * (1.0f64 / 3.0).log2());
        assert_eq!(stats[1].total_transitions, 3);
        assert_eq!(stats[1].unique_symbols, 2);
        assert!((stats[1].entropy_bits - expected).abs() < 1e-12);
        assert!((stats[1].entropy_bits - 0.918).abs() < 1e-3);
    }

    #[test]
    fn test_top_symbols_sorted_and_capped() {
        let stats = build(&["a", "b", "b", "c", "c", "c", "d", "e", "f"]).depth_statistics();
        let top = &stats[0].top_symbols;

        assert_eq!(stats[0].unique_symbols, 6);
        assert_eq!(top.len(), TOP_SYMBOLS);
        assert_eq!(top[0].symbol, "c");
        assert_eq!(top[0].count, 3);
        assert_eq!(top[1].symbol, "b");
        assert!((top[0].p - 3.0 / 9.0).abs() < 1e-12);
        // Ties keep first-seen order: a, d, e before f.
        assert_eq!(top[2].symbol, "a");
        assert_eq!(top[4].symbol, "e");
    }

    #[test]
    fn test_symbols_merge_across_nodes_at_same_depth() {
        let stats = build(&["ax", "bx", "by"]).depth_statistics();
        let depth1 = &stats[1];

        assert_eq!(depth1.total_transitions, 3);
        assert_eq!(depth1.unique_symbols, 2);
        assert_eq!(depth1.top_symbols[0].symbol, "x");
        assert_eq!(depth1.top_symbols[0].count, 2);
    }

    #[test]
    fn test_depths_without_transitions_are_skipped() {
        let stats = build(&["abc", "a"]).depth_statistics();
        let depths: Vec<usize> = stats.iter().map(|s| s.depth).collect();
        assert_eq!(depths, vec![0, 1, 2]);
        assert!(build(&[]).depth_statistics().is_empty());
    }

    #[test]
    fn test_uniform_entropy_hits_upper_bound() {
        let h = entropy_bits([1, 1, 1, 1], 4);
        assert!((h - 2.0).abs() < 1e-12);
        assert_eq!(entropy_bits([5], 5), 0.0);
        assert_eq!(entropy_bits([], 0), 0.0);
    }

    #[test]
    fn test_wire_field_names() {
        let stats = build(&["a"]).depth_statistics();
        let json = serde_json::to_value(&stats[0]).unwrap();

        assert!(json.get("unique_chars").is_some());
        assert_eq!(json["top_chars"][0]["ch"], serde_json::json!("a"));

        let parsed: DepthStatistic = serde_json::from_value(serde_json::json!({
            "depth": 0,
            "total_transitions": 1,
            "unique_symbols": 1,
            "top_symbols": [],
            "entropy_bits": 0.0
        }))
        .unwrap();
        assert_eq!(parsed.unique_symbols, 1);
    }
}
