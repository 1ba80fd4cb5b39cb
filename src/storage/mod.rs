//! Persistence layer: typed arrays and the on-disk store format

pub mod array;
pub mod store;

pub use array::{ArrayBuf, MappedArray, MappedArrayMut, TypedArray};
pub use store::{load, load_undirected, save, save_undirected, ArrayStore, StoreMeta};
