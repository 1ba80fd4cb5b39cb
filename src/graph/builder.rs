//! Graph construction module

use std::path::Path;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::config::{BuildConfig, BuildStrategy};
use crate::error::{GraphError, Result};
use crate::graph::adjacency::Adjacency;
use crate::graph::compact::AdjacencyCompactor;
use crate::graph::degree::{directed_degrees, undirected_degrees};
use crate::graph::layout::fill_indptr;
use crate::graph::linked::LinkedListGraph;
use crate::graph::{CompactGraph, UndirectedGraph};
use crate::storage::store::{
    ArrayStore, StoreMeta, N_INDICES, N_INDPTR, P_INDICES, P_INDPTR, S_INDICES, S_INDPTR,
};

/// Runs the degree → layout → compaction pipeline
///
/// `n_edges_hint` is the number of arc slots the caller reserves: every
/// non-self arc of the stream, duplicates included, must fit in it. The
/// resulting graph does not depend on the hint as long as it is large
/// enough.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    config: BuildConfig,
}

impl GraphBuilder {
    /// Create a builder with the given configuration
    pub fn new(config: BuildConfig) -> Self {
        Self { config }
    }

    /// Configuration this builder runs with
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build a directed graph in memory
    pub fn build<I>(&self, n_nodes: u32, n_edges_hint: u64, edges: I, dedupe: bool) -> Result<CompactGraph>
    where
        I: IntoIterator<Item = (u32, u32)> + Clone,
    {
        self.build_in(&ArrayStore::in_memory(), n_nodes, n_edges_hint, edges, dedupe)
    }

    /// Build a directed graph into a new memory-mapped store at `path`
    pub fn build_to_store<P, I>(
        &self,
        path: P,
        n_nodes: u32,
        n_edges_hint: u64,
        edges: I,
        dedupe: bool,
    ) -> Result<CompactGraph>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (u32, u32)> + Clone,
    {
        let store = ArrayStore::create(path.as_ref())?;
        self.build_in(&store, n_nodes, n_edges_hint, edges, dedupe)
    }

    /// Build a directed graph with arrays allocated by `store`
    pub fn build_in<I>(
        &self,
        store: &ArrayStore,
        n_nodes: u32,
        n_edges_hint: u64,
        edges: I,
        dedupe: bool,
    ) -> Result<CompactGraph>
    where
        I: IntoIterator<Item = (u32, u32)> + Clone,
    {
        log::info!(
            "Building directed graph with {} nodes ({} arc slots reserved, {:?}, dedupe={})",
            n_nodes,
            n_edges_hint,
            self.config.strategy,
            dedupe
        );

        let pool = self.sort_pool(n_nodes)?;
        let graph = match self.config.strategy {
            BuildStrategy::TwoPass => {
                two_pass_directed(store, n_nodes, n_edges_hint, edges, dedupe, pool.as_ref())?
            }
            BuildStrategy::Staged => stage(n_nodes, n_edges_hint, edges)?
                .compact_into(store, dedupe, pool.as_ref())?,
        };

        log::info!(
            "Built directed graph with {} nodes and {} arcs ({} bytes)",
            graph.order(),
            graph.size(),
            graph.nbytes()
        );
        Ok(graph)
    }

    /// Build an undirected graph in memory
    pub fn build_undirected<I>(
        &self,
        n_nodes: u32,
        n_edges_hint: u64,
        edges: I,
        dedupe: bool,
    ) -> Result<UndirectedGraph>
    where
        I: IntoIterator<Item = (u32, u32)> + Clone,
    {
        self.build_undirected_in(&ArrayStore::in_memory(), n_nodes, n_edges_hint, edges, dedupe)
    }

    /// Build an undirected graph into a new memory-mapped store at `path`
    pub fn build_undirected_to_store<P, I>(
        &self,
        path: P,
        n_nodes: u32,
        n_edges_hint: u64,
        edges: I,
        dedupe: bool,
    ) -> Result<UndirectedGraph>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (u32, u32)> + Clone,
    {
        let store = ArrayStore::create(path.as_ref())?;
        self.build_undirected_in(&store, n_nodes, n_edges_hint, edges, dedupe)
    }

    /// Build an undirected graph with arrays allocated by `store`
    pub fn build_undirected_in<I>(
        &self,
        store: &ArrayStore,
        n_nodes: u32,
        n_edges_hint: u64,
        edges: I,
        dedupe: bool,
    ) -> Result<UndirectedGraph>
    where
        I: IntoIterator<Item = (u32, u32)> + Clone,
    {
        log::info!(
            "Building undirected graph with {} nodes ({} edge slots reserved, {:?}, dedupe={})",
            n_nodes,
            n_edges_hint,
            self.config.strategy,
            dedupe
        );

        let pool = self.sort_pool(n_nodes)?;
        let graph = match self.config.strategy {
            BuildStrategy::TwoPass => {
                two_pass_undirected(store, n_nodes, n_edges_hint, edges, dedupe, pool.as_ref())?
            }
            BuildStrategy::Staged => stage(n_nodes, n_edges_hint, edges)?
                .compact_undirected_into(store, dedupe, pool.as_ref())?,
        };

        log::info!(
            "Built undirected graph with {} nodes and {} edges ({} bytes)",
            graph.order(),
            graph.size(),
            graph.nbytes()
        );
        Ok(graph)
    }

    /// Dedicated pool for the per-node sort, only for large graphs
    fn sort_pool(&self, n_nodes: u32) -> Result<Option<ThreadPool>> {
        if (n_nodes as usize) < self.config.parallel_threshold {
            return Ok(None);
        }

        let threads = self.config.worker_threads();
        if threads <= 1 {
            return Ok(None);
        }

        log::info!("Using {} worker threads for adjacency sort", threads);
        let pool = ThreadPoolBuilder::new().num_threads(threads).build()?;
        Ok(Some(pool))
    }
}

fn check_capacity(reserved: u64, required: u64) -> Result<()> {
    if required > reserved {
        return Err(GraphError::CapacityExceeded { reserved, required });
    }
    Ok(())
}

/// Consume the stream once into a staging graph
fn stage<I>(n_nodes: u32, n_edges_hint: u64, edges: I) -> Result<LinkedListGraph>
where
    I: IntoIterator<Item = (u32, u32)>,
{
    log::debug!("Staging edge stream into linked lists");

    let edges = edges.into_iter();
    let mut staged = LinkedListGraph::with_capacity(n_nodes, n_edges_hint);
    staged.reserve(edges.size_hint().0);
    for (u, v) in edges {
        staged.add_arc(u, v)?;
    }
    Ok(staged)
}

fn two_pass_directed<I>(
    store: &ArrayStore,
    n_nodes: u32,
    n_edges_hint: u64,
    edges: I,
    dedupe: bool,
    pool: Option<&ThreadPool>,
) -> Result<CompactGraph>
where
    I: IntoIterator<Item = (u32, u32)> + Clone,
{
    let n = n_nodes as usize;

    // First pass: degree over-counts
    log::debug!("Counting degrees");
    let degrees = directed_degrees(n_nodes, edges.clone())?;
    let reserved = degrees.total();
    check_capacity(n_edges_hint, reserved)?;

    // Lay out slot ranges
    let mut s_indptr = store.alloc::<u64>(S_INDPTR, n + 1)?;
    let mut p_indptr = store.alloc::<u64>(P_INDPTR, n + 1)?;
    fill_indptr(s_indptr.as_mut_slice(), &degrees.out_deg);
    fill_indptr(p_indptr.as_mut_slice(), &degrees.in_deg);
    drop(degrees);

    let mut s_indices = store.alloc::<u32>(S_INDICES, reserved as usize)?;
    let mut p_indices = store.alloc::<u32>(P_INDICES, reserved as usize)?;

    // Second pass: scatter, then sort and sweep
    log::debug!("Scattering {} arcs", reserved);
    let (s_used, p_used) = {
        let mut succ = AdjacencyCompactor::new(s_indptr.as_mut_slice(), s_indices.as_mut_slice());
        let mut pred = AdjacencyCompactor::new(p_indptr.as_mut_slice(), p_indices.as_mut_slice());
        for (u, v) in edges {
            succ.push(u, v)?;
            pred.push(v, u)?;
        }
        (succ.finish(dedupe, pool), pred.finish(dedupe, pool))
    };
    debug_assert_eq!(s_used, p_used);

    let succ = Adjacency::new(s_indptr.into_array(n + 1)?, s_indices.into_array(s_used as usize)?);
    let pred = Adjacency::new(p_indptr.into_array(n + 1)?, p_indices.into_array(p_used as usize)?);

    store.commit(&StoreMeta::new(n_nodes, s_used))?;
    Ok(CompactGraph::from_parts(n_nodes, s_used, pred, succ))
}

fn two_pass_undirected<I>(
    store: &ArrayStore,
    n_nodes: u32,
    n_edges_hint: u64,
    edges: I,
    dedupe: bool,
    pool: Option<&ThreadPool>,
) -> Result<UndirectedGraph>
where
    I: IntoIterator<Item = (u32, u32)> + Clone,
{
    let n = n_nodes as usize;

    log::debug!("Counting degrees");
    let deg = undirected_degrees(n_nodes, edges.clone())?;
    let reserved: u64 = deg.iter().map(|&d| d as u64).sum();
    check_capacity(n_edges_hint, reserved / 2)?;

    let mut indptr = store.alloc::<u64>(N_INDPTR, n + 1)?;
    fill_indptr(indptr.as_mut_slice(), &deg);
    drop(deg);

    let mut indices = store.alloc::<u32>(N_INDICES, reserved as usize)?;

    log::debug!("Scattering {} edges", reserved / 2);
    let used = {
        let mut compactor = AdjacencyCompactor::new(indptr.as_mut_slice(), indices.as_mut_slice());
        for (u, v) in edges {
            compactor.push(u, v)?;
            compactor.push(v, u)?;
        }
        compactor.finish(dedupe, pool)
    };

    let adj = Adjacency::new(indptr.into_array(n + 1)?, indices.into_array(used as usize)?);
    let n_edges = used / 2;

    store.commit(&StoreMeta::new(n_nodes, n_edges))?;
    Ok(UndirectedGraph::from_parts(n_nodes, n_edges, adj))
}

/// Build a directed graph in memory with the default configuration
pub fn build<I>(n_nodes: u32, n_edges_hint: u64, edges: I, dedupe: bool) -> Result<CompactGraph>
where
    I: IntoIterator<Item = (u32, u32)> + Clone,
{
    GraphBuilder::default().build(n_nodes, n_edges_hint, edges, dedupe)
}

/// Build a directed graph into a new store at `path` with the default configuration
pub fn build_to_store<P, I>(
    path: P,
    n_nodes: u32,
    n_edges_hint: u64,
    edges: I,
    dedupe: bool,
) -> Result<CompactGraph>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (u32, u32)> + Clone,
{
    GraphBuilder::default().build_to_store(path, n_nodes, n_edges_hint, edges, dedupe)
}

/// Build an undirected graph in memory with the default configuration
pub fn build_undirected<I>(
    n_nodes: u32,
    n_edges_hint: u64,
    edges: I,
    dedupe: bool,
) -> Result<UndirectedGraph>
where
    I: IntoIterator<Item = (u32, u32)> + Clone,
{
    GraphBuilder::default().build_undirected(n_nodes, n_edges_hint, edges, dedupe)
}

/// Build an undirected graph into a new store at `path` with the default configuration
pub fn build_undirected_to_store<P, I>(
    path: P,
    n_nodes: u32,
    n_edges_hint: u64,
    edges: I,
    dedupe: bool,
) -> Result<UndirectedGraph>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = (u32, u32)> + Clone,
{
    GraphBuilder::default().build_undirected_to_store(path, n_nodes, n_edges_hint, edges, dedupe)
}
