//! On-disk store layout: one metadata record plus one flat file per array

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::mem;
use std::path::{Path, PathBuf};

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::graph::adjacency::Adjacency;
use crate::graph::{CompactGraph, UndirectedGraph};
use crate::storage::array::{ArrayBuf, MappedArray, MappedArrayMut, TypedArray};

/// Metadata record file name
pub const META_FILE: &str = "base.meta";
/// Predecessor index pointers
pub const P_INDPTR: &str = "p_indptr.dat";
/// Predecessor node ids
pub const P_INDICES: &str = "p_indices.dat";
/// Successor index pointers
pub const S_INDPTR: &str = "s_indptr.dat";
/// Successor node ids
pub const S_INDICES: &str = "s_indices.dat";
/// Undirected index pointers
pub const N_INDPTR: &str = "n_indptr.dat";
/// Undirected node ids (each edge twice)
pub const N_INDICES: &str = "n_indices.dat";

/// Width in bytes of a stored node id
pub const NODE_WIDTH: u8 = mem::size_of::<u32>() as u8;

/// Contents of `base.meta`, encoded with bincode as 17 little-endian bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub n_nodes: u64,
    pub n_edges: u64,
    pub elem_width: u8,
}

impl StoreMeta {
    /// Record for a graph with `u32` node ids
    pub fn new(n_nodes: u32, n_edges: u64) -> Self {
        Self {
            n_nodes: n_nodes as u64,
            n_edges,
            elem_width: NODE_WIDTH,
        }
    }

    /// Write the record into `dir`, synced to disk
    pub fn write(&self, dir: &Path) -> Result<()> {
        let file = File::create(dir.join(META_FILE))?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Read and sanity-check the record from `dir`
    pub fn read(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(GraphError::StoreNotFound(dir.to_path_buf()));
        }

        let file = File::open(dir.join(META_FILE)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => GraphError::StoreNotFound(dir.to_path_buf()),
            _ => GraphError::Io(e),
        })?;

        let meta: StoreMeta = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| GraphError::corrupt(dir, format!("unreadable metadata: {}", e)))?;

        if meta.elem_width != NODE_WIDTH {
            return Err(GraphError::corrupt(
                dir,
                format!("unsupported element width {}", meta.elem_width),
            ));
        }
        if meta.n_nodes > u32::MAX as u64 {
            return Err(GraphError::corrupt(
                dir,
                format!("{} nodes exceeds the 32-bit node id space", meta.n_nodes),
            ));
        }

        Ok(meta)
    }

    /// Node count, already checked to fit in a node id
    pub fn node_count(&self) -> u32 {
        self.n_nodes as u32
    }
}

/// Where arrays for a new graph are allocated
#[derive(Debug, Clone)]
pub enum ArrayStore {
    /// Plain process memory
    InMemory,
    /// Memory-mapped files in a new store directory
    Directory(PathBuf),
}

impl ArrayStore {
    /// Allocate arrays in process memory
    pub fn in_memory() -> Self {
        ArrayStore::InMemory
    }

    /// Claim `dir` for a new store; fails if `dir` already exists
    ///
    /// The directory itself is created by the first allocation, so a build
    /// rejected during its degree pass leaves nothing behind.
    pub fn create(dir: &Path) -> Result<Self> {
        if dir.exists() {
            return Err(GraphError::StoreAlreadyExists(dir.to_path_buf()));
        }
        Ok(ArrayStore::Directory(dir.to_path_buf()))
    }

    /// Location of the store, `None` for in-memory graphs
    pub fn path(&self) -> Option<&Path> {
        match self {
            ArrayStore::InMemory => None,
            ArrayStore::Directory(dir) => Some(dir.as_path()),
        }
    }

    /// Allocate a zero-filled array of `len` elements under `name`
    pub fn alloc<T: Pod>(&self, name: &str, len: usize) -> Result<ArrayBuf<T>> {
        match self {
            ArrayStore::InMemory => Ok(ArrayBuf::Owned(vec![T::zeroed(); len])),
            ArrayStore::Directory(dir) => {
                ensure_store_dir(dir)?;
                Ok(ArrayBuf::Mapped(MappedArrayMut::create(&dir.join(name), len)?))
            }
        }
    }

    /// Publish the metadata record; a no-op for in-memory graphs
    ///
    /// Must run after every array of the graph has been finalised.
    pub fn commit(&self, meta: &StoreMeta) -> Result<()> {
        if let ArrayStore::Directory(dir) = self {
            ensure_store_dir(dir)?;
            meta.write(dir)?;
            log::info!(
                "Committed store {} ({} nodes, {} edges)",
                dir.display(),
                meta.n_nodes,
                meta.n_edges
            );
        }
        Ok(())
    }
}

fn create_store_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Err(GraphError::StoreAlreadyExists(dir.to_path_buf()));
    }
    fs::create_dir(dir).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => GraphError::StoreAlreadyExists(dir.to_path_buf()),
        _ => GraphError::Io(e),
    })
}

fn ensure_store_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        create_store_dir(dir)?;
        log::debug!("Created store directory {}", dir.display());
    }
    Ok(())
}

fn write_array<T: Pod>(dir: &Path, name: &str, values: &[T]) -> Result<()> {
    let file = File::create(dir.join(name))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytemuck::cast_slice(values))?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn open_adjacency(
    dir: &Path,
    indptr_name: &str,
    indices_name: &str,
    n_nodes: u32,
    n_indices: usize,
) -> Result<Adjacency> {
    let indptr = MappedArray::<u64>::open(&dir.join(indptr_name), n_nodes as usize + 1)?;
    let indices = MappedArray::<u32>::open(&dir.join(indices_name), n_indices)?;

    let adj = Adjacency::new(Box::new(indptr), Box::new(indices));

    // Layout only; `verify` does the full neighbour scan
    adj.check_indptr(n_nodes, indptr_name).map_err(|e| match e {
        GraphError::InvalidLayout(reason) => GraphError::corrupt(dir, reason),
        e => e,
    })?;

    Ok(adj)
}

fn edge_count(dir: &Path, meta: &StoreMeta, per_edge: u64) -> Result<usize> {
    meta.n_edges
        .checked_mul(per_edge)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| GraphError::corrupt(dir, format!("{} edges cannot be addressed", meta.n_edges)))
}

/// Persist a directed graph into a new store directory
pub fn save(path: impl AsRef<Path>, graph: &CompactGraph) -> Result<()> {
    let dir = path.as_ref();
    create_store_dir(dir)?;
    log::info!(
        "Saving directed graph with {} nodes and {} arcs to {}",
        graph.order(),
        graph.size(),
        dir.display()
    );

    write_array(dir, P_INDPTR, graph.p_indptr())?;
    write_array(dir, P_INDICES, graph.p_indices())?;
    write_array(dir, S_INDPTR, graph.s_indptr())?;
    write_array(dir, S_INDICES, graph.s_indices())?;

    // Metadata last so readers never see it before the arrays
    StoreMeta::new(graph.order(), graph.size()).write(dir)
}

/// Persist an undirected graph into a new store directory
pub fn save_undirected(path: impl AsRef<Path>, graph: &UndirectedGraph) -> Result<()> {
    let dir = path.as_ref();
    create_store_dir(dir)?;
    log::info!(
        "Saving undirected graph with {} nodes and {} edges to {}",
        graph.order(),
        graph.size(),
        dir.display()
    );

    write_array(dir, N_INDPTR, graph.indptr())?;
    write_array(dir, N_INDICES, graph.indices())?;

    StoreMeta::new(graph.order(), graph.size()).write(dir)
}

/// Reopen a directed graph read-only, memory-mapping every array
pub fn load(path: impl AsRef<Path>) -> Result<CompactGraph> {
    let dir = path.as_ref();
    let meta = StoreMeta::read(dir)?;
    let n_nodes = meta.node_count();
    let n_arcs = edge_count(dir, &meta, 1)?;

    let pred = open_adjacency(dir, P_INDPTR, P_INDICES, n_nodes, n_arcs)?;
    let succ = open_adjacency(dir, S_INDPTR, S_INDICES, n_nodes, n_arcs)?;

    log::info!(
        "Loaded directed graph with {} nodes and {} arcs from {}",
        n_nodes,
        meta.n_edges,
        dir.display()
    );
    Ok(CompactGraph::from_parts(n_nodes, meta.n_edges, pred, succ))
}

/// Reopen an undirected graph read-only
pub fn load_undirected(path: impl AsRef<Path>) -> Result<UndirectedGraph> {
    let dir = path.as_ref();
    let meta = StoreMeta::read(dir)?;
    let n_nodes = meta.node_count();
    let n_slots = edge_count(dir, &meta, 2)?;

    let adj = open_adjacency(dir, N_INDPTR, N_INDICES, n_nodes, n_slots)?;

    log::info!(
        "Loaded undirected graph with {} nodes and {} edges from {}",
        n_nodes,
        meta.n_edges,
        dir.display()
    );
    Ok(UndirectedGraph::from_parts(n_nodes, meta.n_edges, adj))
}
