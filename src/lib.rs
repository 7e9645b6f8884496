//! silc client library
//!
//! Exchange typed tensors, datasets and ML models between processes
//! through a Redis-compatible store with the RedisAI command family.

pub mod client;
pub mod cluster;
pub mod config;
pub mod dataset;
pub mod metadata;
pub mod router;
pub mod tensor;
pub mod utils;

pub use client::{Client, ConnectionPool, KeyClass, Transport};
pub use config::{ClientConfig, ServerAddress};
pub use dataset::DataSet;
pub use metadata::{MetaDataType, MetadataField, MetadataValue};
pub use router::{Command, ModelOptions, Router};
pub use tensor::{HostArray, MemoryLayout, Nested, Tensor, TensorElement, TensorType};
pub use utils::{ClientError, Result};
