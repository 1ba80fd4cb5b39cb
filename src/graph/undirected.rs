//! Read-only undirected graph over a single symmetric adjacency

use std::fmt;
use std::ops::Range;

use crate::error::{check_node, GraphError, Result};
use crate::graph::adjacency::Adjacency;
use crate::graph::digraph::{Arcs, Neighbors};

/// Compressed undirected graph
///
/// Every edge `{u, v}` occupies one slot in the range of `u` and one in the
/// range of `v`, so the index array holds `2 * n_edges` ids.
pub struct UndirectedGraph {
    n_nodes: u32,
    n_edges: u64,
    adj: Adjacency,
}

impl UndirectedGraph {
    /// Assemble a graph from an already compacted symmetric adjacency
    pub fn from_parts(n_nodes: u32, n_edges: u64, adj: Adjacency) -> Self {
        Self {
            n_nodes,
            n_edges,
            adj,
        }
    }

    /// Number of nodes
    pub fn order(&self) -> u32 {
        self.n_nodes
    }

    /// Number of undirected edges
    pub fn size(&self) -> u64 {
        self.n_edges
    }

    /// All node ids, `0..n_nodes`
    pub fn nodes(&self) -> Range<u32> {
        0..self.n_nodes
    }

    /// True when `u` is a valid node id
    pub fn has_node(&self, u: u32) -> bool {
        u < self.n_nodes
    }

    /// Number of neighbours of `u`
    pub fn degree(&self, u: u32) -> Result<usize> {
        check_node(u, self.n_nodes)?;
        Ok(self.adj.degree(u))
    }

    /// Neighbours of `u` in ascending order
    pub fn neighbours(&self, u: u32) -> Result<Neighbors<'_>> {
        Ok(self.neighbour_slice(u)?.iter().copied())
    }

    /// Sorted neighbour ids of `u`
    pub fn neighbour_slice(&self, u: u32) -> Result<&[u32]> {
        check_node(u, self.n_nodes)?;
        Ok(self.adj.range(u))
    }

    /// Check if `u` and `v` are adjacent (binary search)
    pub fn has_edge(&self, u: u32, v: u32) -> Result<bool> {
        check_node(u, self.n_nodes)?;
        check_node(v, self.n_nodes)?;

        // Search the shorter of the two ranges
        if self.adj.degree(u) <= self.adj.degree(v) {
            Ok(self.adj.contains(u, v))
        } else {
            Ok(self.adj.contains(v, u))
        }
    }

    /// Every edge once, as `(u, v)` with `u < v`
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        Arcs::new(&self.adj, self.n_nodes, true).filter(|&(u, v)| u < v)
    }

    /// Index pointers
    pub fn indptr(&self) -> &[u64] {
        self.adj.indptr()
    }

    /// Neighbour ids of all nodes, each edge stored twice
    pub fn indices(&self) -> &[u32] {
        self.adj.indices()
    }

    /// Total size of the internal arrays in bytes
    pub fn nbytes(&self) -> usize {
        self.adj.nbytes()
    }

    /// True when the arrays are memory-mapped from a store
    pub fn is_mapped(&self) -> bool {
        self.adj.is_mapped()
    }

    /// Check the compacted-array invariants and that every edge is stored
    /// symmetrically
    pub fn verify(&self) -> Result<()> {
        self.adj.verify(self.n_nodes, "neighbours")?;

        if self.adj.len() as u64 != 2 * self.n_edges {
            return Err(GraphError::InvalidLayout(format!(
                "{} edges declared but {} slots stored",
                self.n_edges,
                self.adj.len()
            )));
        }

        for u in self.nodes() {
            for &v in self.adj.range(u) {
                if self.adj.multiplicity(u, v) != self.adj.multiplicity(v, u) {
                    return Err(GraphError::InvalidLayout(format!(
                        "edge {{{}, {}}} is not stored symmetrically",
                        u, v
                    )));
                }
            }
        }

        Ok(())
    }
}

impl fmt::Debug for UndirectedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndirectedGraph")
            .field("n_nodes", &self.n_nodes)
            .field("n_edges", &self.n_edges)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
