//! Graph statistics summary

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::CompactGraph;

/// Number of degree buckets; the last one collects every degree >= 100
pub const DEGREE_BUCKETS: usize = 101;

/// Size and degree summary of a directed graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: u32,
    pub edge_count: u64,
    pub avg_out_degree: f64,
    pub avg_in_degree: f64,
    pub max_out_degree: usize,
    pub max_in_degree: usize,
    /// Nodes per out-degree, 0-100+ buckets
    pub degree_distribution: Vec<u64>,
    pub nbytes: usize,
    pub mapped: bool,
}

impl GraphStats {
    pub fn collect(graph: &CompactGraph) -> Self {
        let mut degree_dist = vec![0u64; DEGREE_BUCKETS];
        let mut max_out_degree = 0;
        let mut max_in_degree = 0;

        let s_indptr = graph.s_indptr();
        let p_indptr = graph.p_indptr();
        for u in 0..graph.order() as usize {
            let out_degree = (s_indptr[u + 1] - s_indptr[u]) as usize;
            let in_degree = (p_indptr[u + 1] - p_indptr[u]) as usize;

            degree_dist[out_degree.min(DEGREE_BUCKETS - 1)] += 1;
            max_out_degree = max_out_degree.max(out_degree);
            max_in_degree = max_in_degree.max(in_degree);
        }

        // Every arc has one tail and one head, so both averages agree
        let avg_degree = if graph.order() == 0 {
            0.0
        } else {
            graph.size() as f64 / graph.order() as f64
        };

        Self {
            node_count: graph.order(),
            edge_count: graph.size(),
            avg_out_degree: avg_degree,
            avg_in_degree: avg_degree,
            max_out_degree,
            max_in_degree,
            degree_distribution: degree_dist,
            nbytes: graph.nbytes(),
            mapped: graph.is_mapped(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the summary as pretty-printed JSON to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        log::info!("Saving graph statistics to {}", path.as_ref().display());

        let mut file = File::create(path)?;
        file.write_all(self.to_json()?.as_bytes())?;
        Ok(())
    }
}
