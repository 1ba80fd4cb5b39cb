//! Whole-graph operations: merge and node-induced subgraph
//!
//! Both re-run the build pipeline over an arc stream derived from existing
//! graphs, so the result obeys the same invariants as a fresh build.

use std::path::Path;

use crate::error::{check_node, GraphError, Result};
use crate::graph::builder::GraphBuilder;
use crate::graph::CompactGraph;
use crate::storage::store::ArrayStore;

fn check_same_nodes(g0: &CompactGraph, g1: &CompactGraph) -> Result<()> {
    if g0.order() != g1.order() {
        return Err(GraphError::NodeSetMismatch {
            left: g0.order(),
            right: g1.order(),
        });
    }
    Ok(())
}

/// Membership mask over the node ids of `graph`
fn node_mask<I>(graph: &CompactGraph, node_set: I) -> Result<Vec<bool>>
where
    I: IntoIterator<Item = u32>,
{
    let mut mask = vec![false; graph.order() as usize];
    for u in node_set {
        check_node(u, graph.order())?;
        mask[u as usize] = true;
    }
    Ok(mask)
}

impl GraphBuilder {
    /// Union of the arcs of two graphs over the same node set
    pub fn merge(&self, g0: &CompactGraph, g1: &CompactGraph, dedupe: bool) -> Result<CompactGraph> {
        check_same_nodes(g0, g1)?;
        self.merge_in(&ArrayStore::in_memory(), g0, g1, dedupe)
    }

    /// Like [`merge`](Self::merge), persisted to a new store at `path`
    pub fn merge_to_store<P: AsRef<Path>>(
        &self,
        path: P,
        g0: &CompactGraph,
        g1: &CompactGraph,
        dedupe: bool,
    ) -> Result<CompactGraph> {
        // Reject before the directory is created
        check_same_nodes(g0, g1)?;
        let store = ArrayStore::create(path.as_ref())?;
        self.merge_in(&store, g0, g1, dedupe)
    }

    fn merge_in(
        &self,
        store: &ArrayStore,
        g0: &CompactGraph,
        g1: &CompactGraph,
        dedupe: bool,
    ) -> Result<CompactGraph> {
        log::info!(
            "Merging graphs with {} and {} arcs over {} nodes",
            g0.size(),
            g1.size(),
            g0.order()
        );

        let arcs = g0.arcs(true).chain(g1.arcs(true));
        self.build_in(store, g0.order(), g0.size() + g1.size(), arcs, dedupe)
    }

    /// Arcs of `graph` with both endpoints in `node_set`
    ///
    /// Node ids keep their numbering; nodes outside the set end up isolated.
    pub fn subgraph<I>(&self, graph: &CompactGraph, node_set: I, dedupe: bool) -> Result<CompactGraph>
    where
        I: IntoIterator<Item = u32>,
    {
        let mask = node_mask(graph, node_set)?;
        self.subgraph_in(&ArrayStore::in_memory(), graph, &mask, dedupe)
    }

    /// Like [`subgraph`](Self::subgraph), persisted to a new store at `path`
    pub fn subgraph_to_store<P, I>(
        &self,
        path: P,
        graph: &CompactGraph,
        node_set: I,
        dedupe: bool,
    ) -> Result<CompactGraph>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = u32>,
    {
        let mask = node_mask(graph, node_set)?;
        let store = ArrayStore::create(path.as_ref())?;
        self.subgraph_in(&store, graph, &mask, dedupe)
    }

    fn subgraph_in(
        &self,
        store: &ArrayStore,
        graph: &CompactGraph,
        mask: &[bool],
        dedupe: bool,
    ) -> Result<CompactGraph> {
        let members: Vec<u32> = graph.nodes().filter(|&u| mask[u as usize]).collect();
        let succ = graph.succ();
        let hint: u64 = members.iter().map(|&u| succ.degree(u) as u64).sum();

        log::info!(
            "Extracting subgraph of {} nodes ({} candidate arcs)",
            members.len(),
            hint
        );

        let arcs = members.iter().flat_map(move |&u| {
            succ.range(u)
                .iter()
                .filter(move |&&v| mask[v as usize])
                .map(move |&v| (u, v))
        });
        self.build_in(store, graph.order(), hint, arcs, dedupe)
    }
}

/// Merge two graphs in memory with the default configuration
pub fn merge(g0: &CompactGraph, g1: &CompactGraph, dedupe: bool) -> Result<CompactGraph> {
    GraphBuilder::default().merge(g0, g1, dedupe)
}

/// Merge two graphs into a new store at `path` with the default configuration
pub fn merge_to_store<P: AsRef<Path>>(
    path: P,
    g0: &CompactGraph,
    g1: &CompactGraph,
    dedupe: bool,
) -> Result<CompactGraph> {
    GraphBuilder::default().merge_to_store(path, g0, g1, dedupe)
}

/// Node-induced subgraph in memory with the default configuration
pub fn subgraph<I>(graph: &CompactGraph, node_set: I, dedupe: bool) -> Result<CompactGraph>
where
    I: IntoIterator<Item = u32>,
{
    GraphBuilder::default().subgraph(graph, node_set, dedupe)
}

/// Node-induced subgraph in a new store at `path` with the default configuration
pub fn subgraph_to_store<P, I>(
    path: P,
    graph: &CompactGraph,
    node_set: I,
    dedupe: bool,
) -> Result<CompactGraph>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = u32>,
{
    GraphBuilder::default().subgraph_to_store(path, graph, node_set, dedupe)
}
