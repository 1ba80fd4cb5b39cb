use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::sync::Arc;

use anyhow::Result;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

use static_graph::{
    build, build_to_store, build_undirected, build_undirected_to_store, load, load_undirected,
    merge, merge_to_store, save, subgraph, subgraph_to_store, BuildConfig, BuildStrategy,
    CompactGraph, GraphBuilder, GraphError, GraphStats,
};

const N_NODES: u32 = 100;
const N_ARCS: usize = 10_000;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Random arcs with self-loops left in and every second arc repeated
fn random_arcs(n_nodes: u32, n_arcs: usize, seed: u64) -> Vec<(u32, u32)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut arcs: Vec<(u32, u32)> = (0..n_arcs)
        .map(|_| (rng.gen_range(0..n_nodes), rng.gen_range(0..n_nodes)))
        .collect();
    let dups: Vec<_> = arcs.iter().step_by(2).copied().collect();
    arcs.extend(dups);
    arcs
}

fn distinct_arcs(arcs: &[(u32, u32)]) -> BTreeSet<(u32, u32)> {
    arcs.iter().copied().filter(|&(u, v)| u != v).collect()
}

fn assert_same_arrays(a: &CompactGraph, b: &CompactGraph) {
    assert_eq!(a.order(), b.order());
    assert_eq!(a.size(), b.size());
    assert_eq!(a.s_indptr(), b.s_indptr());
    assert_eq!(a.s_indices(), b.s_indices());
    assert_eq!(a.p_indptr(), b.p_indptr());
    assert_eq!(a.p_indices(), b.p_indices());
}

fn assert_invariants(graph: &CompactGraph) -> Result<()> {
    graph.verify()?;

    for u in graph.nodes() {
        let succ = graph.successor_slice(u)?;
        assert_eq!(graph.out_degree(u)?, succ.len());
        assert_eq!(
            graph.s_indptr()[u as usize + 1] - graph.s_indptr()[u as usize],
            succ.len() as u64
        );
        assert!(succ.windows(2).all(|w| w[0] < w[1]), "node {} not sorted", u);
        assert!(!succ.contains(&u), "node {} has a self-loop", u);

        for &v in succ {
            assert!(graph.predecessor_slice(v)?.binary_search(&u).is_ok());
        }
        for v in graph.predecessors(u)? {
            assert!(graph.has_arc(v, u)?);
        }
    }
    Ok(())
}

#[test]
fn random_graph_has_expected_arcs() -> Result<()> {
    init_logger();
    let arcs = random_arcs(N_NODES, N_ARCS, 1);
    let graph = build(N_NODES, arcs.len() as u64, arcs.iter().copied(), true)?;

    let expected = distinct_arcs(&arcs);
    assert_eq!(graph.size(), expected.len() as u64);
    assert_eq!(graph.arcs(true).collect::<BTreeSet<_>>(), expected);
    assert_eq!(graph.arcs(false).collect::<BTreeSet<_>>(), expected);
    assert!(graph.is_simple());
    assert_invariants(&graph)
}

#[test]
fn raw_build_keeps_every_non_self_arc() -> Result<()> {
    init_logger();
    let arcs = random_arcs(N_NODES, N_ARCS, 2);
    let graph = build(N_NODES, arcs.len() as u64, arcs.iter().copied(), false)?;

    let non_self = arcs.iter().filter(|&&(u, v)| u != v).count();
    assert_eq!(graph.size(), non_self as u64);
    graph.verify()?;
    Ok(())
}

#[test]
fn self_loop_and_parallel_arc_are_dropped() -> Result<()> {
    let graph = build(2, 4, vec![(0, 1), (1, 0), (1, 1), (0, 1)], true)?;
    assert_eq!(graph.size(), 2);
    assert_eq!(graph.successors(0)?.collect::<Vec<_>>(), vec![1]);
    assert_eq!(graph.successors(1)?.collect::<Vec<_>>(), vec![0]);
    Ok(())
}

#[test]
fn store_round_trip() -> Result<()> {
    init_logger();
    let dir = tempdir()?;
    let path = dir.path().join("graph");
    let arcs = random_arcs(N_NODES, N_ARCS, 3);

    let in_memory = build(N_NODES, arcs.len() as u64, arcs.iter().copied(), true)?;
    let built = build_to_store(&path, N_NODES, arcs.len() as u64, arcs.iter().copied(), true)?;
    assert!(built.is_mapped());
    assert_same_arrays(&in_memory, &built);
    drop(built);

    let loaded = load(&path)?;
    assert!(loaded.is_mapped());
    assert_same_arrays(&in_memory, &loaded);
    assert_invariants(&loaded)?;

    // Files hold exactly the array bytes
    let s_indices = fs::read(path.join("s_indices.dat"))?;
    assert_eq!(s_indices.len() as u64, 4 * loaded.size());
    assert_eq!(fs::metadata(path.join("base.meta"))?.len(), 17);
    Ok(())
}

#[test]
fn save_then_load() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("saved");
    let arcs = random_arcs(50, 500, 4);
    let graph = build(50, arcs.len() as u64, arcs.iter().copied(), true)?;

    save(&path, &graph)?;
    let loaded = load(&path)?;
    assert_same_arrays(&graph, &loaded);

    let err = save(&path, &graph).unwrap_err();
    assert!(matches!(err, GraphError::StoreAlreadyExists(_)));
    Ok(())
}

#[test]
fn oversized_hint_gives_same_graph() -> Result<()> {
    let arcs = random_arcs(N_NODES, 2_000, 5);
    let exact = build(N_NODES, arcs.len() as u64, arcs.iter().copied(), true)?;
    let loose = build(N_NODES, 2 * arcs.len() as u64, arcs.iter().copied(), true)?;
    assert_same_arrays(&exact, &loose);
    Ok(())
}

#[test]
fn undersized_hint_fails() {
    let arcs = vec![(0, 1), (1, 2), (2, 3)];
    let err = build(4, 1, arcs, true).unwrap_err();
    assert!(matches!(err, GraphError::CapacityExceeded { .. }));
}

#[test]
fn merge_counts() -> Result<()> {
    init_logger();
    let arcs0 = random_arcs(N_NODES, 1_000, 6);
    let arcs1 = random_arcs(N_NODES, 1_000, 7);
    let g0 = build(N_NODES, arcs0.len() as u64, arcs0.iter().copied(), true)?;
    let g1 = build(N_NODES, arcs1.len() as u64, arcs1.iter().copied(), true)?;

    let union: BTreeSet<_> = distinct_arcs(&arcs0).union(&distinct_arcs(&arcs1)).copied().collect();
    let merged = merge(&g0, &g1, true)?;
    assert_eq!(merged.size(), union.len() as u64);
    assert_eq!(merged.arcs(true).collect::<BTreeSet<_>>(), union);
    assert_invariants(&merged)?;

    let raw = merge(&g0, &g1, false)?;
    assert_eq!(raw.size(), g0.size() + g1.size());
    raw.verify()?;

    let dir = tempdir()?;
    let stored = merge_to_store(dir.path().join("merged"), &g0, &g1, true)?;
    assert_same_arrays(&merged, &stored);
    Ok(())
}

#[test]
fn merge_mismatch_creates_nothing() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("merged");
    let g0 = build(100, 1, vec![(0, 1)], true)?;
    let g1 = build(150, 1, vec![(0, 1)], true)?;

    let err = merge_to_store(&path, &g0, &g1, true).unwrap_err();
    assert!(matches!(
        err,
        GraphError::NodeSetMismatch {
            left: 100,
            right: 150
        }
    ));
    assert!(!path.exists());
    Ok(())
}

#[test]
fn subgraph_keeps_only_internal_arcs() -> Result<()> {
    init_logger();
    let arcs = random_arcs(N_NODES, N_ARCS, 8);
    let graph = build(N_NODES, arcs.len() as u64, arcs.iter().copied(), true)?;

    let mut rng = StdRng::seed_from_u64(9);
    let members: BTreeSet<u32> = (0..40).map(|_| rng.gen_range(0..N_NODES)).collect();

    let sub = subgraph(&graph, members.iter().copied(), true)?;
    let expected: BTreeSet<_> = graph
        .arcs(true)
        .filter(|(u, v)| members.contains(u) && members.contains(v))
        .collect();
    assert_eq!(sub.order(), N_NODES);
    assert_eq!(sub.arcs(true).collect::<BTreeSet<_>>(), expected);
    for u in graph.nodes().filter(|u| !members.contains(u)) {
        assert_eq!(sub.out_degree(u)?, 0);
        assert_eq!(sub.in_degree(u)?, 0);
    }
    assert_invariants(&sub)?;

    let dir = tempdir()?;
    let path = dir.path().join("sub");
    subgraph_to_store(&path, &graph, members.iter().copied(), true)?;
    assert_same_arrays(&sub, &load(&path)?);
    Ok(())
}

#[test]
fn subgraph_rejects_unknown_node() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("sub");
    let graph = build(10, 1, vec![(0, 1)], true)?;

    let err = subgraph_to_store(&path, &graph, vec![1, 10], true).unwrap_err();
    assert!(matches!(err, GraphError::NodeOutOfRange { node: 10, .. }));
    assert!(!path.exists());
    Ok(())
}

#[test]
fn strategies_produce_identical_stores() -> Result<()> {
    init_logger();
    let dir = tempdir()?;
    let arcs = random_arcs(N_NODES, N_ARCS, 10);
    let hint = arcs.len() as u64;

    let two_pass = build_to_store(dir.path().join("two_pass"), N_NODES, hint, arcs.iter().copied(), true)?;
    let staged = GraphBuilder::new(BuildConfig::new(BuildStrategy::Staged, 1, usize::MAX))
        .build_to_store(dir.path().join("staged"), N_NODES, hint, arcs.iter().copied(), true)?;
    assert_same_arrays(&two_pass, &staged);

    for name in ["s_indptr.dat", "s_indices.dat", "p_indptr.dat", "p_indices.dat", "base.meta"] {
        assert_eq!(
            fs::read(dir.path().join("two_pass").join(name))?,
            fs::read(dir.path().join("staged").join(name))?,
            "{} differs",
            name
        );
    }
    Ok(())
}

#[test]
fn pooled_sort_matches_sequential() -> Result<()> {
    let arcs = random_arcs(N_NODES, N_ARCS, 11);
    let hint = arcs.len() as u64;

    let sequential = build(N_NODES, hint, arcs.iter().copied(), false)?;
    for strategy in [BuildStrategy::TwoPass, BuildStrategy::Staged] {
        let pooled = GraphBuilder::new(BuildConfig::new(strategy, 2, 0))
            .build(N_NODES, hint, arcs.iter().copied(), false)?;
        assert_same_arrays(&sequential, &pooled);
    }
    Ok(())
}

#[test]
fn undirected_round_trip() -> Result<()> {
    init_logger();
    let dir = tempdir()?;
    let path = dir.path().join("undirected");
    let edges = random_arcs(N_NODES, 2_000, 12);
    let hint = edges.len() as u64;

    let expected: BTreeSet<_> = edges
        .iter()
        .filter(|&&(u, v)| u != v)
        .map(|&(u, v)| (u.min(v), u.max(v)))
        .collect();

    let in_memory = build_undirected(N_NODES, hint, edges.iter().copied(), true)?;
    assert_eq!(in_memory.size(), expected.len() as u64);
    assert_eq!(in_memory.edges().collect::<BTreeSet<_>>(), expected);
    in_memory.verify()?;

    build_undirected_to_store(&path, N_NODES, hint, edges.iter().copied(), true)?;
    let loaded = load_undirected(&path)?;
    assert!(loaded.is_mapped());
    assert_eq!(loaded.indptr(), in_memory.indptr());
    assert_eq!(loaded.indices(), in_memory.indices());
    for (u, v) in expected {
        assert!(loaded.has_edge(v, u)?);
    }
    Ok(())
}

#[test]
fn load_missing_store() {
    let dir = tempdir().unwrap();
    let err = load(dir.path().join("absent")).unwrap_err();
    assert!(matches!(err, GraphError::StoreNotFound(_)));
}

#[test]
fn build_into_existing_store_fails() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("graph");
    build_to_store(&path, 3, 1, vec![(0, 1)], true)?;

    let err = build_to_store(&path, 3, 1, vec![(0, 1)], true).unwrap_err();
    assert!(matches!(err, GraphError::StoreAlreadyExists(_)));
    Ok(())
}

#[test]
fn truncated_array_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("graph");
    let arcs = random_arcs(20, 100, 13);
    let graph = build_to_store(&path, 20, arcs.len() as u64, arcs, true)?;
    let n_arcs = graph.size();
    drop(graph);

    let file = OpenOptions::new().write(true).open(path.join("s_indices.dat"))?;
    file.set_len(4 * (n_arcs - 1))?;
    drop(file);

    let err = load(&path).unwrap_err();
    assert!(matches!(err, GraphError::CorruptStore { .. }));
    Ok(())
}

#[test]
fn garbage_metadata_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("graph");
    build_to_store(&path, 3, 1, vec![(0, 1)], true)?;

    fs::write(path.join("base.meta"), b"junk")?;
    let err = load(&path).unwrap_err();
    assert!(matches!(err, GraphError::CorruptStore { .. }));
    Ok(())
}

/// Small valid store to tamper with
fn small_store(path: &std::path::Path) -> Result<()> {
    build_to_store(path, 3, 2, vec![(0, 1), (1, 2)], true)?;
    Ok(())
}

#[test]
fn overflowing_metadata_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("graph");
    small_store(&path)?;

    let mut meta = Vec::with_capacity(17);
    meta.extend_from_slice(&3u64.to_le_bytes());
    meta.extend_from_slice(&(1u64 << 62).to_le_bytes());
    meta.push(4);
    fs::write(path.join("base.meta"), meta)?;

    let err = load(&path).unwrap_err();
    assert!(matches!(err, GraphError::CorruptStore { .. }));
    let err = load_undirected(&path).unwrap_err();
    assert!(matches!(err, GraphError::CorruptStore { .. }));
    Ok(())
}

#[test]
fn inconsistent_indptr_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("graph");
    small_store(&path)?;

    // s_indptr is [0, 1, 2, 2]; point node 0 past the index array
    let file = path.join("s_indptr.dat");
    let mut bytes = fs::read(&file)?;
    bytes[8..16].copy_from_slice(&99u64.to_le_bytes());
    fs::write(&file, bytes)?;

    let err = load(&path).unwrap_err();
    assert!(matches!(err, GraphError::CorruptStore { .. }));
    Ok(())
}

#[test]
fn missing_array_file_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("graph");
    small_store(&path)?;

    fs::remove_file(path.join("p_indices.dat"))?;
    let err = load(&path).unwrap_err();
    assert!(matches!(err, GraphError::CorruptStore { .. }));
    Ok(())
}

#[test]
fn staged_accepts_oversized_hint() -> Result<()> {
    let arcs = random_arcs(N_NODES, 1_000, 16);
    let hint = 1u64 << 33;

    let two_pass = build(N_NODES, hint, arcs.iter().copied(), true)?;
    let staged = GraphBuilder::new(BuildConfig::new(BuildStrategy::Staged, 1, usize::MAX))
        .build(N_NODES, hint, arcs.iter().copied(), true)?;
    assert_same_arrays(&two_pass, &staged);
    Ok(())
}

#[test]
fn failed_build_can_be_retried_at_same_path() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("graph");
    let arcs = random_arcs(N_NODES, 100, 17);

    let err = build_to_store(&path, N_NODES, 10, arcs.iter().copied(), true).unwrap_err();
    assert!(matches!(err, GraphError::CapacityExceeded { .. }));
    assert!(!path.exists());

    let graph = build_to_store(&path, N_NODES, arcs.len() as u64, arcs.iter().copied(), true)?;
    assert_eq!(graph.size(), distinct_arcs(&arcs).len() as u64);
    Ok(())
}

#[test]
fn shared_across_threads() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("graph");
    let arcs = random_arcs(N_NODES, N_ARCS, 14);
    build_to_store(&path, N_NODES, arcs.len() as u64, arcs, true)?;

    let graph = Arc::new(load(&path)?);
    let total: u64 = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4u32)
            .map(|t| {
                let graph = Arc::clone(&graph);
                scope.spawn(move || {
                    graph
                        .nodes()
                        .filter(|u| u % 4 == t)
                        .map(|u| graph.out_degree(u).unwrap() as u64)
                        .sum::<u64>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });
    assert_eq!(total, graph.size());
    Ok(())
}

#[test]
fn stats_of_loaded_graph() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("graph");
    let arcs = random_arcs(N_NODES, 1_000, 15);
    build_to_store(&path, N_NODES, arcs.len() as u64, arcs, true)?;

    let graph = load(&path)?;
    let stats = GraphStats::collect(&graph);
    assert!(stats.mapped);
    assert_eq!(stats.edge_count, graph.size());
    assert_eq!(stats.degree_distribution.iter().sum::<u64>(), N_NODES as u64);

    let out = dir.path().join("stats.json");
    stats.save(&out)?;
    let back: GraphStats = serde_json::from_str(&fs::read_to_string(out)?)?;
    assert_eq!(back.edge_count, stats.edge_count);
    Ok(())
}

fn small_graph() -> impl Strategy<Value = (u32, Vec<(u32, u32)>)> {
    (1u32..24).prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..80)))
}

proptest! {
    #[test]
    fn built_graphs_hold_exactly_the_distinct_arcs((n, arcs) in small_graph(), dedupe in any::<bool>()) {
        let graph = build(n, arcs.len() as u64, arcs.iter().copied(), dedupe).unwrap();
        prop_assert!(graph.verify().is_ok());

        if dedupe {
            prop_assert_eq!(graph.arcs(true).collect::<BTreeSet<_>>(), distinct_arcs(&arcs));
            prop_assert!(graph.is_simple());
        } else {
            let mut expected: Vec<_> = arcs.iter().copied().filter(|&(u, v)| u != v).collect();
            expected.sort_unstable();
            prop_assert_eq!(graph.arcs(true).collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn staged_matches_two_pass((n, arcs) in small_graph()) {
        let two_pass = build(n, arcs.len() as u64, arcs.iter().copied(), true).unwrap();
        let staged = GraphBuilder::new(BuildConfig::new(BuildStrategy::Staged, 1, usize::MAX))
            .build(n, arcs.len() as u64, arcs.iter().copied(), true)
            .unwrap();
        prop_assert_eq!(two_pass.s_indptr(), staged.s_indptr());
        prop_assert_eq!(two_pass.s_indices(), staged.s_indices());
        prop_assert_eq!(two_pass.p_indptr(), staged.p_indptr());
        prop_assert_eq!(two_pass.p_indices(), staged.p_indices());
    }
}
