//! Structural summary of many sampled outputs of a generative text model.
//!
//! Every collected output is fed into a prefix trie, one symbol (character
//! or token) at a time. The trie can then be exported as a plain edge list,
//! as a path-compressed (radix) edge list, or summarized per depth.
//!
//! ## Core Concepts
//!
//! - **TrieAggregator**: owns the append-only trie for one collection run
//! - **GraphData**: serializable node/edge lists derived from the trie
//! - **DepthStatistic**: branching, top symbols and entropy at one depth
//! - **RunRecord**: the per-sample result record persisted in snapshots
//!
//! ```text
//! "ab", "ac", "ab"
//!
//!   (0) --a/3--> (1) --b/2--> (2)
//!                    \--c/1--> (3)
//! ```

mod compress;
mod graph;
mod record;
mod stats;
mod trie;

pub use graph::{GraphData, GraphEdge, GraphNode};
pub use record::{
    DeviationInfo, ErrorInfo, LogprobContent, LogprobDetail, RunRecord, RunStatus, Totals, Usage,
};
pub use stats::{entropy_bits, DepthStatistic, TopSymbol, TOP_SYMBOLS};
pub use trie::{TrieAggregator, TrieEdge, TrieNode};
