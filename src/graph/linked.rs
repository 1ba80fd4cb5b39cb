//! Appendable linked-list staging graph
//!
//! Arcs are prepended to per-node lists stored in a flat arena of
//! `(value, next)` cells, so arcs can be added one at a time without knowing
//! degrees up front. The staging graph is later compacted into the immutable
//! CSR form.

use std::mem;

use rayon::ThreadPool;

use crate::error::{check_node, GraphError, Result};
use crate::graph::adjacency::Adjacency;
use crate::graph::compact::AdjacencyCompactor;
use crate::graph::layout::fill_indptr;
use crate::graph::{CompactGraph, UndirectedGraph};
use crate::storage::store::{
    ArrayStore, StoreMeta, N_INDICES, N_INDPTR, P_INDICES, P_INDPTR, S_INDICES, S_INDPTR,
};

/// End-of-list marker in head and next slots
const NONE: u32 = u32::MAX;

/// Most arcs one arena can index without reaching `NONE`
const MAX_ARCS: u64 = NONE as u64;

/// Cells reserved up front; the arena grows past this on demand
const INITIAL_CELLS: u64 = 1 << 16;

#[derive(Debug, Clone, Copy)]
struct Cell {
    value: u32,
    next: u32,
}

/// One direction of the staging graph: a head per node plus the cell arena
#[derive(Debug, Clone)]
struct LinkedLists {
    head: Vec<u32>,
    degree: Vec<u32>,
    cells: Vec<Cell>,
}

impl LinkedLists {
    fn new(n_nodes: u32, reserve: usize) -> Self {
        Self {
            head: vec![NONE; n_nodes as usize],
            degree: vec![0; n_nodes as usize],
            cells: Vec::with_capacity(reserve),
        }
    }

    #[inline]
    fn prepend(&mut self, u: u32, v: u32) {
        let idx = self.cells.len() as u32;
        self.cells.push(Cell {
            value: v,
            next: self.head[u as usize],
        });
        self.head[u as usize] = idx;
        self.degree[u as usize] += 1;
    }

    fn iter(&self, u: u32) -> ListIter<'_> {
        ListIter {
            cells: &self.cells,
            next: self.head[u as usize],
        }
    }
}

/// Walks one node's list, most recently added arc first
#[derive(Debug, Clone)]
pub struct ListIter<'a> {
    cells: &'a [Cell],
    next: u32,
}

impl Iterator for ListIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next == NONE {
            return None;
        }
        let cell = self.cells[self.next as usize];
        self.next = cell.next;
        Some(cell.value)
    }
}

/// Mutable staging graph with O(1) arc insertion
///
/// Uses about twice the memory of the compacted form. Self-loops are ignored
/// on insertion, and the arc reserve is fixed at creation.
#[derive(Debug, Clone)]
pub struct LinkedListGraph {
    n_nodes: u32,
    arc_reserve: u64,
    succ: LinkedLists,
    pred: LinkedLists,
}

impl LinkedListGraph {
    /// Create an empty staging graph over nodes `0..n_nodes` accepting at
    /// most `arc_reserve` arcs
    ///
    /// The reserve is a limit, not an allocation: the cell arenas start
    /// small and grow as arcs arrive.
    pub fn with_capacity(n_nodes: u32, arc_reserve: u64) -> Self {
        let cells = arc_reserve.min(INITIAL_CELLS) as usize;
        Self {
            n_nodes,
            arc_reserve,
            succ: LinkedLists::new(n_nodes, cells),
            pred: LinkedLists::new(n_nodes, cells),
        }
    }

    /// Reserve arena room for `additional` more arcs, capped by the arc reserve
    pub fn reserve(&mut self, additional: usize) {
        let room = self.arc_reserve.min(MAX_ARCS).saturating_sub(self.size());
        let additional = (additional as u64).min(room) as usize;
        self.succ.cells.reserve(additional);
        self.pred.cells.reserve(additional);
    }

    /// Add the arc `u -> v`; returns `false` if it was a self-loop and ignored
    pub fn add_arc(&mut self, u: u32, v: u32) -> Result<bool> {
        check_node(u, self.n_nodes)?;
        check_node(v, self.n_nodes)?;
        if u == v {
            return Ok(false);
        }

        let n_arcs = self.size();
        if n_arcs >= self.arc_reserve {
            return Err(GraphError::CapacityExceeded {
                reserved: self.arc_reserve,
                required: n_arcs + 1,
            });
        }
        // Cell indices are u32 and NONE is reserved
        if n_arcs >= MAX_ARCS {
            return Err(GraphError::CapacityExceeded {
                reserved: MAX_ARCS,
                required: n_arcs + 1,
            });
        }

        self.succ.prepend(u, v);
        self.pred.prepend(v, u);
        Ok(true)
    }

    /// Number of nodes
    pub fn order(&self) -> u32 {
        self.n_nodes
    }

    /// Number of arcs added so far, duplicates included
    pub fn size(&self) -> u64 {
        self.succ.cells.len() as u64
    }

    /// All node ids
    pub fn nodes(&self) -> std::ops::Range<u32> {
        0..self.n_nodes
    }

    /// Arcs staged out of `u`, duplicates included
    pub fn out_degree(&self, u: u32) -> Result<usize> {
        check_node(u, self.n_nodes)?;
        Ok(self.succ.degree[u as usize] as usize)
    }

    /// Arcs staged into `v`, duplicates included
    pub fn in_degree(&self, v: u32) -> Result<usize> {
        check_node(v, self.n_nodes)?;
        Ok(self.pred.degree[v as usize] as usize)
    }

    /// Successors of `u` in reverse insertion order
    pub fn successors(&self, u: u32) -> Result<ListIter<'_>> {
        check_node(u, self.n_nodes)?;
        Ok(self.succ.iter(u))
    }

    /// Predecessors of `v` in reverse insertion order
    pub fn predecessors(&self, v: u32) -> Result<ListIter<'_>> {
        check_node(v, self.n_nodes)?;
        Ok(self.pred.iter(v))
    }

    /// Every staged arc, grouped by source node
    pub fn arcs(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.nodes()
            .flat_map(move |u| self.succ.iter(u).map(move |v| (u, v)))
    }

    /// Bytes held by heads, degree counters and cells
    pub fn nbytes(&self) -> usize {
        let per_direction = |lists: &LinkedLists| {
            (lists.head.len() + lists.degree.len()) * mem::size_of::<u32>()
                + lists.cells.len() * mem::size_of::<Cell>()
        };
        per_direction(&self.succ) + per_direction(&self.pred)
    }

    /// Compact into an in-memory directed graph
    pub fn compact(self, dedupe: bool) -> Result<CompactGraph> {
        self.compact_into(&ArrayStore::in_memory(), dedupe, None)
    }

    /// Compact into arrays allocated by `store`
    pub fn compact_into(
        self,
        store: &ArrayStore,
        dedupe: bool,
        pool: Option<&ThreadPool>,
    ) -> Result<CompactGraph> {
        log::debug!(
            "Compacting staged graph with {} nodes and {} arcs",
            self.n_nodes,
            self.size()
        );

        let n_nodes = self.n_nodes;
        let succ = compact_lists(store, &self.succ, &[], S_INDPTR, S_INDICES, dedupe, pool)?;
        let pred = compact_lists(store, &self.pred, &[], P_INDPTR, P_INDICES, dedupe, pool)?;

        let n_arcs = succ.len() as u64;
        store.commit(&StoreMeta::new(n_nodes, n_arcs))?;
        Ok(CompactGraph::from_parts(n_nodes, n_arcs, pred, succ))
    }

    /// Compact into an undirected graph: each node's successors and
    /// predecessors become its neighbours
    pub fn compact_undirected_into(
        self,
        store: &ArrayStore,
        dedupe: bool,
        pool: Option<&ThreadPool>,
    ) -> Result<UndirectedGraph> {
        log::debug!(
            "Compacting staged graph with {} nodes and {} arcs as undirected",
            self.n_nodes,
            self.size()
        );

        let n_nodes = self.n_nodes;
        let adj = compact_lists(
            store,
            &self.succ,
            &[&self.pred],
            N_INDPTR,
            N_INDICES,
            dedupe,
            pool,
        )?;

        let n_edges = adj.len() as u64 / 2;
        store.commit(&StoreMeta::new(n_nodes, n_edges))?;
        Ok(UndirectedGraph::from_parts(n_nodes, n_edges, adj))
    }
}

/// Lay out, scatter and compact the union of `primary` and `extra` lists
fn compact_lists(
    store: &ArrayStore,
    primary: &LinkedLists,
    extra: &[&LinkedLists],
    indptr_name: &str,
    indices_name: &str,
    dedupe: bool,
    pool: Option<&ThreadPool>,
) -> Result<Adjacency> {
    let n_nodes = primary.head.len();

    let mut deg = primary.degree.clone();
    for lists in extra {
        for (d, &e) in deg.iter_mut().zip(&lists.degree) {
            *d += e;
        }
    }

    let mut indptr = store.alloc::<u64>(indptr_name, n_nodes + 1)?;
    let reserved = fill_indptr(indptr.as_mut_slice(), &deg);
    let mut indices = store.alloc::<u32>(indices_name, reserved as usize)?;

    let used = {
        let mut compactor = AdjacencyCompactor::new(indptr.as_mut_slice(), indices.as_mut_slice());
        for lists in std::iter::once(&primary).chain(extra) {
            for u in 0..n_nodes as u32 {
                for v in lists.iter(u) {
                    compactor.push(u, v)?;
                }
            }
        }
        compactor.finish(dedupe, pool)
    };

    Ok(Adjacency::new(
        indptr.into_array(n_nodes + 1)?,
        indices.into_array(used as usize)?,
    ))
}
