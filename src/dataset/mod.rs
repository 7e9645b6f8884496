//! Datasets: tensors and metadata stored and fetched as one object

pub mod pack;
pub mod set;

pub use pack::{read_directory, DirectoryEntry, EntryKind, DATASET_MAGIC, DATASET_VERSION};
pub use set::DataSet;
