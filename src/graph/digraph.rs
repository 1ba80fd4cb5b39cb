//! Read-only directed graph over compacted successor and predecessor arrays

use std::fmt;
use std::iter::Copied;
use std::ops::Range;
use std::slice::Iter;

use crate::error::{check_node, GraphError, Result};
use crate::graph::adjacency::Adjacency;

/// Lazy, restartable sequence of neighbour ids
pub type Neighbors<'a> = Copied<Iter<'a, u32>>;

/// Compressed directed graph
///
/// `n_edges` arcs are stored twice: once in the successor arrays
/// (`s_indptr`/`s_indices`) and once in the predecessor arrays
/// (`p_indptr`/`p_indices`). Neighbour ranges are sorted ascending and never
/// contain the node itself. The arrays are either owned or read-only memory
/// maps; the graph never changes after construction and can be shared
/// across threads.
pub struct CompactGraph {
    n_nodes: u32,
    n_edges: u64,
    pred: Adjacency,
    succ: Adjacency,
}

impl CompactGraph {
    /// Assemble a graph from already compacted arrays
    pub fn from_parts(n_nodes: u32, n_edges: u64, pred: Adjacency, succ: Adjacency) -> Self {
        Self {
            n_nodes,
            n_edges,
            pred,
            succ,
        }
    }

    /// Number of nodes
    pub fn order(&self) -> u32 {
        self.n_nodes
    }

    /// Number of arcs
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

    /// Number of successors of `u`
    pub fn out_degree(&self, u: u32) -> Result<usize> {
        check_node(u, self.n_nodes)?;
        Ok(self.succ.degree(u))
    }

    /// Number of predecessors of `v`
    pub fn in_degree(&self, v: u32) -> Result<usize> {
        check_node(v, self.n_nodes)?;
        Ok(self.pred.degree(v))
    }

    /// Successors of `u` in ascending order
    pub fn successors(&self, u: u32) -> Result<Neighbors<'_>> {
        Ok(self.successor_slice(u)?.iter().copied())
    }

    /// Predecessors of `v` in ascending order
    pub fn predecessors(&self, v: u32) -> Result<Neighbors<'_>> {
        Ok(self.predecessor_slice(v)?.iter().copied())
    }

    /// Sorted successor ids of `u`
    pub fn successor_slice(&self, u: u32) -> Result<&[u32]> {
        check_node(u, self.n_nodes)?;
        Ok(self.succ.range(u))
    }

    /// Sorted predecessor ids of `v`
    pub fn predecessor_slice(&self, v: u32) -> Result<&[u32]> {
        check_node(v, self.n_nodes)?;
        Ok(self.pred.range(v))
    }

    /// Check if there's an arc from `u` to `v` (binary search)
    pub fn has_arc(&self, u: u32, v: u32) -> Result<bool> {
        check_node(u, self.n_nodes)?;
        check_node(v, self.n_nodes)?;
        Ok(self.succ.contains(u, v))
    }

    /// Every arc `(u, v)`
    ///
    /// With `forward` the successor arrays are walked (grouped by `u`);
    /// otherwise the predecessor arrays are walked (grouped by `v`). Both
    /// directions yield the same multiset of arcs.
    pub fn arcs(&self, forward: bool) -> Arcs<'_> {
        let adj = if forward { &self.succ } else { &self.pred };
        Arcs::new(adj, self.n_nodes, forward)
    }

    pub(crate) fn succ(&self) -> &Adjacency {
        &self.succ
    }

    /// Successor index pointers
    pub fn s_indptr(&self) -> &[u64] {
        self.succ.indptr()
    }

    /// Successor ids of all nodes
    pub fn s_indices(&self) -> &[u32] {
        self.succ.indices()
    }

    /// Predecessor index pointers
    pub fn p_indptr(&self) -> &[u64] {
        self.pred.indptr()
    }

    /// Predecessor ids of all nodes
    pub fn p_indices(&self) -> &[u32] {
        self.pred.indices()
    }

    /// Total size of the internal arrays in bytes
    pub fn nbytes(&self) -> usize {
        self.pred.nbytes() + self.succ.nbytes()
    }

    /// True when the arrays are memory-mapped from a store
    pub fn is_mapped(&self) -> bool {
        self.pred.is_mapped() && self.succ.is_mapped()
    }

    /// True when no arc appears twice
    pub fn is_simple(&self) -> bool {
        self.succ.is_simple(self.n_nodes)
    }

    /// Check every invariant of the compacted form, including that the
    /// successor and predecessor arrays describe the same arcs
    pub fn verify(&self) -> Result<()> {
        self.succ.verify(self.n_nodes, "successors")?;
        self.pred.verify(self.n_nodes, "predecessors")?;

        if self.succ.len() as u64 != self.n_edges || self.pred.len() as u64 != self.n_edges {
            return Err(GraphError::InvalidLayout(format!(
                "{} arcs declared but {} successor and {} predecessor slots stored",
                self.n_edges,
                self.succ.len(),
                self.pred.len()
            )));
        }

        for u in self.nodes() {
            let nbrs = self.succ.range(u);
            let mut i = 0;
            while i < nbrs.len() {
                let v = nbrs[i];
                let run = nbrs[i..].iter().take_while(|&&x| x == v).count();
                if self.pred.multiplicity(v, u) != run {
                    return Err(GraphError::InvalidLayout(format!(
                        "arc {} -> {} appears {} times forward but {} times backward",
                        u,
                        v,
                        run,
                        self.pred.multiplicity(v, u)
                    )));
                }
                i += run;
            }
        }

        Ok(())
    }
}

impl fmt::Debug for CompactGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompactGraph")
            .field("n_nodes", &self.n_nodes)
            .field("n_edges", &self.n_edges)
            .field("mapped", &self.is_mapped())
            .finish()
    }
}

/// Iterator over all arcs of one adjacency direction
#[derive(Clone)]
pub struct Arcs<'a> {
    indptr: &'a [u64],
    indices: &'a [u32],
    forward: bool,
    node: u32,
    next_node: u32,
    n_nodes: u32,
    pos: usize,
    end: usize,
}

impl<'a> Arcs<'a> {
    pub(crate) fn new(adj: &'a Adjacency, n_nodes: u32, forward: bool) -> Self {
        Self {
            indptr: adj.indptr(),
            indices: adj.indices(),
            forward,
            node: 0,
            next_node: 0,
            n_nodes,
            pos: 0,
            end: 0,
        }
    }
}

impl Iterator for Arcs<'_> {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<(u32, u32)> {
        while self.pos == self.end {
            if self.next_node >= self.n_nodes {
                return None;
            }
            self.node = self.next_node;
            self.pos = self.indptr[self.node as usize] as usize;
            self.end = self.indptr[self.node as usize + 1] as usize;
            self.next_node += 1;
        }

        let other = self.indices[self.pos];
        self.pos += 1;
        if self.forward {
            Some((self.node, other))
        } else {
            Some((other, self.node))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.indices.len() - self.indptr[self.next_node as usize] as usize
            + (self.end - self.pos);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Arcs<'_> {}
