//! Build configuration for the graph construction pipeline

/// How the edge stream is turned into compacted arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildStrategy {
    /// Count degrees in one pass, replay the stream to scatter arcs, then
    /// sort and shrink. Needs a replayable edge stream.
    #[default]
    TwoPass,

    /// Consume the stream once into a linked-list staging graph and compact
    /// that. Costs an extra arena of `(value, next)` cells per direction.
    Staged,
}

/// Configuration for [`GraphBuilder`](crate::graph::builder::GraphBuilder)
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Which construction pipeline to run
    pub strategy: BuildStrategy,

    /// Worker threads for the per-node sort (0 = use all available cores)
    pub threads: usize,

    /// Minimum node count before the per-node sort goes parallel
    pub parallel_threshold: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            strategy: BuildStrategy::TwoPass,
            threads: 0,
            parallel_threshold: 100_000,
        }
    }
}

impl BuildConfig {
    /// Create a new configuration with custom values
    pub fn new(strategy: BuildStrategy, threads: usize, parallel_threshold: usize) -> Self {
        Self {
            strategy,
            threads,
            parallel_threshold,
        }
    }

    /// Number of sort workers, resolving 0 to the machine's core count
    pub fn worker_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            num_cpus::get()
        }
    }
}
