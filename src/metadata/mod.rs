//! Named, self-describing metadata fields attached to datasets

pub mod field;

pub use field::{MetaDataType, MetaScalar, MetadataField, MetadataValue};
