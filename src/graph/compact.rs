//! Adjacency compaction: scatter arcs into their slot ranges, sort each range,
//! then sweep once to drop parallel arcs while shrinking `indptr` in place

use std::mem;

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::error::{check_node, GraphError, Result};

/// Nodes handed to one sort task in the parallel path
const NODES_PER_TASK: usize = 4096;

/// Fills one `(indptr, indices)` pair laid out from degree over-counts
///
/// Each node owns the slot range `[indptr[u], indptr[u + 1])` and a write
/// cursor starting at `indptr[u]`. After all arcs are pushed, [`finish`]
/// sorts and compacts the filled part of every range.
///
/// [`finish`]: AdjacencyCompactor::finish
pub struct AdjacencyCompactor<'a> {
    indptr: &'a mut [u64],
    indices: &'a mut [u32],
    cursor: Vec<u64>,
}

impl<'a> AdjacencyCompactor<'a> {
    /// `indptr` holds `n_nodes + 1` prefix sums; `indices` at least `indptr[n_nodes]` slots
    pub fn new(indptr: &'a mut [u64], indices: &'a mut [u32]) -> Self {
        let n_nodes = indptr.len() - 1;
        debug_assert!(indices.len() as u64 >= indptr[n_nodes]);

        let cursor = indptr[..n_nodes].to_vec();
        Self {
            indptr,
            indices,
            cursor,
        }
    }

    pub fn node_count(&self) -> u32 {
        self.cursor.len() as u32
    }

    /// Append `v` to the slot range of `u`; self-loops are dropped here and
    /// never occupy a slot
    #[inline]
    pub fn push(&mut self, u: u32, v: u32) -> Result<()> {
        let n_nodes = self.node_count();
        check_node(u, n_nodes)?;
        check_node(v, n_nodes)?;
        if u == v {
            return Ok(());
        }

        let pos = self.cursor[u as usize];
        if pos >= self.indptr[u as usize + 1] {
            // The replayed stream produced more arcs than were counted
            let reserved = self.indptr[n_nodes as usize];
            return Err(GraphError::CapacityExceeded {
                reserved,
                required: reserved + 1,
            });
        }

        self.indices[pos as usize] = v;
        self.cursor[u as usize] = pos + 1;
        Ok(())
    }

    /// Sort every node's range, collapse duplicates when `dedupe` is set and
    /// rewrite `indptr`; returns the number of slots still in use
    ///
    /// Slots that were reserved but never filled are discarded, so a stream
    /// that yields fewer arcs on replay still compacts correctly.
    pub fn finish(self, dedupe: bool, pool: Option<&ThreadPool>) -> u64 {
        let Self {
            indptr,
            indices,
            cursor,
        } = self;

        match pool {
            Some(pool) => {
                log::debug!(
                    "Sorting {} adjacency ranges on {} workers",
                    cursor.len(),
                    pool.current_num_threads()
                );
                pool.install(|| sort_ranges_parallel(indptr, &cursor, indices));
            }
            None => sort_ranges(indptr, &cursor, indices),
        }

        let used = sweep(indptr, &cursor, indices, dedupe);
        log::debug!(
            "Compacted {} reserved slots down to {}",
            indices.len(),
            used
        );
        used
    }
}

fn sort_ranges(indptr: &[u64], cursor: &[u64], indices: &mut [u32]) {
    for (u, &filled) in cursor.iter().enumerate() {
        let start = indptr[u] as usize;
        indices[start..filled as usize].sort_unstable();
    }
}

/// Same as [`sort_ranges`], with nodes split into chunks that each own a
/// disjoint sub-slice of `indices`
fn sort_ranges_parallel(indptr: &[u64], cursor: &[u64], indices: &mut [u32]) {
    let n_nodes = cursor.len();
    let mut tasks = Vec::with_capacity(n_nodes / NODES_PER_TASK + 1);

    let mut rest = indices;
    let mut base = 0u64;
    for first in (0..n_nodes).step_by(NODES_PER_TASK) {
        let last = (first + NODES_PER_TASK).min(n_nodes);
        let (chunk, tail) = mem::take(&mut rest).split_at_mut((indptr[last] - base) as usize);
        tasks.push((first, last, base, chunk));
        rest = tail;
        base = indptr[last];
    }

    tasks.into_par_iter().for_each(|(first, last, base, chunk)| {
        for u in first..last {
            let start = (indptr[u] - base) as usize;
            let end = (cursor[u] - base) as usize;
            chunk[start..end].sort_unstable();
        }
    });
}

/// Single forward pass over sorted ranges, writing survivors to the front
fn sweep(indptr: &mut [u64], cursor: &[u64], indices: &mut [u32], dedupe: bool) -> u64 {
    let mut write = 0usize;
    let mut read_start = indptr[0] as usize;

    for (u, &filled) in cursor.iter().enumerate() {
        // indptr[u + 1] is overwritten below; remember where the next range starts
        let next_start = indptr[u + 1] as usize;

        let mut last = None;
        for read in read_start..filled as usize {
            let v = indices[read];
            if dedupe && last == Some(v) {
                continue;
            }
            indices[write] = v;
            write += 1;
            last = Some(v);
        }

        indptr[u + 1] = write as u64;
        read_start = next_start;
    }

    indptr[0] = 0;
    write as u64
}
