//! One compacted `(indptr, indices)` pair and the queries every graph needs from it

use std::fmt;

use itertools::Itertools;

use crate::error::{GraphError, Result};
use crate::storage::TypedArray;

/// Compressed adjacency: `indices[indptr[u]..indptr[u + 1]]` are the
/// neighbours of `u`, sorted ascending.
pub struct Adjacency {
    indptr: Box<dyn TypedArray<u64>>,
    indices: Box<dyn TypedArray<u32>>,
}

impl Adjacency {
    /// Wrap an already compacted pair of arrays
    pub fn new(indptr: Box<dyn TypedArray<u64>>, indices: Box<dyn TypedArray<u32>>) -> Self {
        Self { indptr, indices }
    }

    /// Index pointers, `n_nodes + 1` entries
    #[inline]
    pub fn indptr(&self) -> &[u64] {
        self.indptr.as_slice()
    }

    /// Neighbour ids of all nodes, back to back
    #[inline]
    pub fn indices(&self) -> &[u32] {
        self.indices.as_slice()
    }

    /// Neighbour slice of `u`; the caller has range-checked `u`
    #[inline]
    pub fn range(&self, u: u32) -> &[u32] {
        let indptr = self.indptr();
        let start = indptr[u as usize] as usize;
        let end = indptr[u as usize + 1] as usize;
        &self.indices()[start..end]
    }

    /// Length of the neighbour range of `u`
    #[inline]
    pub fn degree(&self, u: u32) -> usize {
        let indptr = self.indptr();
        (indptr[u as usize + 1] - indptr[u as usize]) as usize
    }

    /// Binary search in the sorted neighbour range of `u`
    #[inline]
    pub fn contains(&self, u: u32, v: u32) -> bool {
        self.range(u).binary_search(&v).is_ok()
    }

    /// How many times `v` occurs in the neighbour range of `u`
    pub fn multiplicity(&self, u: u32, v: u32) -> usize {
        let nbrs = self.range(u);
        nbrs.partition_point(|&x| x <= v) - nbrs.partition_point(|&x| x < v)
    }

    /// Total slots in use
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True when no slot is in use
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Bytes held by both arrays
    pub fn nbytes(&self) -> usize {
        self.indptr.nbytes() + self.indices.nbytes()
    }

    /// True when both arrays are memory-mapped
    pub fn is_mapped(&self) -> bool {
        self.indptr.is_mapped() && self.indices.is_mapped()
    }

    /// O(n) check that `indptr` is a valid non-decreasing layout over
    /// `indices`; every range query relies on it
    pub fn check_indptr(&self, n_nodes: u32, label: &str) -> Result<()> {
        let indptr = self.indptr();
        let indices = self.indices();

        if indptr.len() != n_nodes as usize + 1 {
            return Err(invalid(format!(
                "{}: indptr has {} entries for {} nodes",
                label,
                indptr.len(),
                n_nodes
            )));
        }
        if indptr[0] != 0 || indptr[n_nodes as usize] != indices.len() as u64 {
            return Err(invalid(format!(
                "{}: indptr spans [{}, {}) over {} indices",
                label,
                indptr[0],
                indptr[n_nodes as usize],
                indices.len()
            )));
        }
        if let Some((u, _)) = indptr.iter().tuple_windows().find_position(|(a, b)| a > b) {
            return Err(invalid(format!("{}: indptr decreases after node {}", label, u)));
        }

        Ok(())
    }

    /// Full O(n + m) check of the compacted-array invariants
    pub fn verify(&self, n_nodes: u32, label: &str) -> Result<()> {
        self.check_indptr(n_nodes, label)?;

        for u in 0..n_nodes {
            let nbrs = self.range(u);
            if let Some(&v) = nbrs.iter().find(|&&v| v >= n_nodes || v == u) {
                return Err(invalid(format!(
                    "{}: node {} lists invalid neighbour {}",
                    label, u, v
                )));
            }
            if nbrs.iter().tuple_windows().any(|(a, b)| a > b) {
                return Err(invalid(format!("{}: neighbours of {} are unsorted", label, u)));
            }
        }

        Ok(())
    }

    /// True when no node lists the same neighbour twice
    pub fn is_simple(&self, n_nodes: u32) -> bool {
        (0..n_nodes).all(|u| self.range(u).iter().tuple_windows().all(|(a, b)| a < b))
    }
}

fn invalid(reason: String) -> GraphError {
    GraphError::InvalidLayout(reason)
}

impl fmt::Debug for Adjacency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adjacency")
            .field("nodes", &self.indptr.len().saturating_sub(1))
            .field("slots", &self.indices.len())
            .field("mapped", &self.is_mapped())
            .finish()
    }
}
