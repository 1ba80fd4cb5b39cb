//! Graph representation and construction module

pub mod adjacency;
pub mod builder;
pub mod compact;
pub mod degree;
pub mod digraph;
pub mod layout;
pub mod linked;
pub mod ops;
pub mod undirected;

pub use adjacency::Adjacency;
pub use builder::{build, build_to_store, build_undirected, build_undirected_to_store, GraphBuilder};
pub use digraph::{Arcs, CompactGraph, Neighbors};
pub use linked::LinkedListGraph;
pub use ops::{merge, merge_to_store, subgraph, subgraph_to_store};
pub use undirected::UndirectedGraph;
