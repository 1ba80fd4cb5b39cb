//! Compact, immutable CSR graph storage with optional memory-mapped backing

pub mod config;
pub mod error;
pub mod graph;
pub mod stats;
pub mod storage;

pub use config::{BuildConfig, BuildStrategy};
pub use error::{GraphError, Result};
pub use graph::{
    build, build_to_store, build_undirected, build_undirected_to_store, merge, merge_to_store,
    subgraph, subgraph_to_store, CompactGraph, GraphBuilder, LinkedListGraph, UndirectedGraph,
};
pub use stats::GraphStats;
pub use storage::{load, load_undirected, save, save_undirected};
