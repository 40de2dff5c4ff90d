//! CLI command implementations.

pub mod collect;
pub mod compress;
pub mod config;
pub mod inspect;
pub mod mermaid;
