//! Fixed-size integer arrays, owned in memory or backed by memory-mapped files

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::marker::PhantomData;
use std::mem;
use std::path::{Path, PathBuf};

use bytemuck::Pod;
use memmap2::{Mmap, MmapMut};

use crate::error::{GraphError, Result};

/// Read-only view over a contiguous array of plain integers
///
/// Graphs program against this trait only, so a freshly built graph (owned
/// `Vec`) and a reopened store (read-only memory map) answer queries through
/// the same code.
pub trait TypedArray<T>: Send + Sync {
    /// The array contents
    fn as_slice(&self) -> &[T];

    /// Number of elements
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// True when the array holds no elements
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the array contents in bytes
    fn nbytes(&self) -> usize {
        self.len() * mem::size_of::<T>()
    }

    /// True when the contents live in a memory-mapped file
    fn is_mapped(&self) -> bool {
        false
    }
}

impl<T: Pod + Send + Sync> TypedArray<T> for Vec<T> {
    fn as_slice(&self) -> &[T] {
        self
    }
}

/// Read-only memory-mapped array
///
/// Zero-length arrays are not mapped at all; mapping an empty file is not
/// portable.
pub struct MappedArray<T> {
    path: PathBuf,
    map: Option<Mmap>,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> MappedArray<T> {
    /// Map an existing array file that must hold exactly `len` elements
    pub fn open(path: &Path, len: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => GraphError::corrupt(path, "array file is missing"),
            _ => GraphError::Io(e),
        })?;
        Self::from_file(&file, path, len)
    }

    fn from_file(file: &File, path: &Path, len: usize) -> Result<Self> {
        let expected = len
            .checked_mul(mem::size_of::<T>())
            .map(|n| n as u64)
            .ok_or_else(|| GraphError::corrupt(path, format!("{} elements cannot be addressed", len)))?;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(GraphError::corrupt(
                path,
                format!("expected {} bytes for {} elements, found {}", expected, len, actual),
            ));
        }

        let map = if len == 0 {
            None
        } else {
            // SAFETY: the store is build-once; after `base.meta` is written no
            // writer touches the array files again, so the mapping is never
            // mutated underneath us.
            let map = unsafe { Mmap::map(file)? };
            bytemuck::try_cast_slice::<u8, T>(&map[..])
                .map_err(|e| GraphError::corrupt(path, format!("unaligned array: {:?}", e)))?;
            Some(map)
        };

        Ok(Self {
            path: path.to_path_buf(),
            map,
            len,
            _marker: PhantomData,
        })
    }

    /// File backing this array
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Pod + Send + Sync> TypedArray<T> for MappedArray<T> {
    fn as_slice(&self) -> &[T] {
        match &self.map {
            Some(map) => bytemuck::cast_slice(&map[..]),
            None => &[],
        }
    }

    fn len(&self) -> usize {
        self.len
    }

    fn is_mapped(&self) -> bool {
        true
    }
}

impl<T> fmt::Debug for MappedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedArray")
            .field("path", &self.path)
            .field("len", &self.len)
            .finish()
    }
}

/// Writable memory-mapped array used while a graph is being built into a store
pub struct MappedArrayMut<T> {
    path: PathBuf,
    file: File,
    map: Option<MmapMut>,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> MappedArrayMut<T> {
    /// Create a new zero-filled array file of `len` elements
    ///
    /// Fails if the file already exists.
    pub fn create(path: &Path, len: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        file.set_len((len * mem::size_of::<T>()) as u64)?;

        let map = if len == 0 {
            None
        } else {
            // SAFETY: we just created the file with `create_new`, so this
            // mapping is the only handle writing to it.
            Some(unsafe { MmapMut::map_mut(&file)? })
        };

        Ok(Self {
            path: path.to_path_buf(),
            file,
            map,
            len,
            _marker: PhantomData,
        })
    }

    /// Number of elements currently allocated
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no elements are allocated
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The array contents
    pub fn as_slice(&self) -> &[T] {
        match &self.map {
            Some(map) => bytemuck::cast_slice(&map[..]),
            None => &[],
        }
    }

    /// Writable view of the array contents
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match &mut self.map {
            Some(map) => bytemuck::cast_slice_mut(&mut map[..]),
            None => &mut [],
        }
    }

    /// Write all dirty pages back to the file
    pub fn flush(&self) -> Result<()> {
        if let Some(map) = &self.map {
            map.flush()?;
        }
        Ok(())
    }

    /// Flush, shrink the file to `len` elements and reopen it read-only
    pub fn finish(self, len: usize) -> Result<MappedArray<T>> {
        if len > self.len {
            return Err(GraphError::InvalidLayout(format!(
                "cannot grow {} from {} to {} elements",
                self.path.display(),
                self.len,
                len
            )));
        }

        self.flush()?;
        let Self { path, file, map, .. } = self;
        // The mapping must be gone before the file shrinks under it
        drop(map);

        file.set_len((len * mem::size_of::<T>()) as u64)?;
        file.sync_all()?;
        log::debug!("Finalised {} with {} elements", path.display(), len);

        MappedArray::from_file(&file, &path, len)
    }
}

/// An array under construction, owned or memory-mapped
pub enum ArrayBuf<T> {
    Owned(Vec<T>),
    Mapped(MappedArrayMut<T>),
}

impl<T: Pod + Send + Sync> ArrayBuf<T> {
    /// Number of elements allocated
    pub fn len(&self) -> usize {
        match self {
            ArrayBuf::Owned(vec) => vec.len(),
            ArrayBuf::Mapped(map) => map.len(),
        }
    }

    /// True when no elements are allocated
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The array contents
    pub fn as_slice(&self) -> &[T] {
        match self {
            ArrayBuf::Owned(vec) => vec.as_slice(),
            ArrayBuf::Mapped(map) => map.as_slice(),
        }
    }

    /// Writable view of the array contents
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        match self {
            ArrayBuf::Owned(vec) => vec.as_mut_slice(),
            ArrayBuf::Mapped(map) => map.as_mut_slice(),
        }
    }

    /// Truncate to `len` elements and freeze into a read-only array
    pub fn into_array(self, len: usize) -> Result<Box<dyn TypedArray<T>>> {
        match self {
            ArrayBuf::Owned(mut vec) => {
                vec.truncate(len);
                vec.shrink_to_fit();
                Ok(Box::new(vec))
            }
            ArrayBuf::Mapped(map) => Ok(Box::new(map.finish(len)?)),
        }
    }
}
