//! First pass over an edge stream: per-node degree over-counts

use crate::error::{check_node, Result};

/// Out- and in-degree over-counts of a directed edge stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degrees {
    /// Successor slots needed per node
    pub out_deg: Vec<u32>,

    /// Predecessor slots needed per node
    pub in_deg: Vec<u32>,
}

impl Degrees {
    /// Number of non-self arcs seen, duplicates included
    pub fn total(&self) -> u64 {
        self.out_deg.iter().map(|&d| d as u64).sum()
    }
}

/// Count successor and predecessor slots for every node
///
/// Every non-self arc is counted, including duplicates; deduplication happens
/// later during compaction, which shrinks the arrays sized here.
pub fn directed_degrees<I>(n_nodes: u32, edges: I) -> Result<Degrees>
where
    I: IntoIterator<Item = (u32, u32)>,
{
    let mut out_deg = vec![0u32; n_nodes as usize];
    let mut in_deg = vec![0u32; n_nodes as usize];

    for (u, v) in edges {
        check_node(u, n_nodes)?;
        check_node(v, n_nodes)?;

        // Skip self-loops
        if u == v {
            continue;
        }

        out_deg[u as usize] += 1;
        in_deg[v as usize] += 1;
    }

    Ok(Degrees { out_deg, in_deg })
}

/// Count slots for an undirected stream: each edge occupies one slot at both ends
pub fn undirected_degrees<I>(n_nodes: u32, edges: I) -> Result<Vec<u32>>
where
    I: IntoIterator<Item = (u32, u32)>,
{
    let mut deg = vec![0u32; n_nodes as usize];

    for (u, v) in edges {
        check_node(u, n_nodes)?;
        check_node(v, n_nodes)?;

        if u == v {
            continue;
        }

        deg[u as usize] += 1;
        deg[v as usize] += 1;
    }

    Ok(deg)
}
