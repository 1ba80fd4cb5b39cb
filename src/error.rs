//! Error types shared by the build, storage and query layers

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong while building, persisting or querying a graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// A node id at or beyond `n_nodes` was passed in
    #[error("node {node} is out of range for a graph with {n_nodes} nodes")]
    NodeOutOfRange { node: u32, n_nodes: u32 },

    /// The edge stream needs more arc slots than were reserved
    #[error("edge stream needs at least {required} arc slots but only {reserved} were reserved")]
    CapacityExceeded { reserved: u64, required: u64 },

    /// Two graphs combined by an operation do not share a node set
    #[error("node sets differ: {left} nodes vs {right} nodes")]
    NodeSetMismatch { left: u32, right: u32 },

    #[error("no graph store found at {}", .0.display())]
    StoreNotFound(PathBuf),

    #[error("a graph store already exists at {}", .0.display())]
    StoreAlreadyExists(PathBuf),

    /// Metadata and array files on disk disagree
    #[error("corrupt graph store at {}: {reason}", .path.display())]
    CorruptStore { path: PathBuf, reason: String },

    /// An in-memory graph broke one of the compacted-array invariants
    #[error("invalid adjacency layout: {0}")]
    InvalidLayout(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("store metadata encoding failed: {0}")]
    Meta(#[from] bincode::Error),

    #[error("statistics encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to start sort worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, GraphError>;

impl GraphError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        GraphError::CorruptStore {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Fail with `NodeOutOfRange` unless `node < n_nodes`
#[inline]
pub(crate) fn check_node(node: u32, n_nodes: u32) -> Result<()> {
    if node < n_nodes {
        Ok(())
    } else {
        Err(GraphError::NodeOutOfRange { node, n_nodes })
    }
}
