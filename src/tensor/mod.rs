//! Tensor type system and tensor buffers
//!
//! - `TensorType` / `TensorElement`: element types and their wire discriminants
//! - `Tensor`: validated value object with the type + shape + payload encoding
//! - `Nested` / `HostArray`: copy conversions to and from nested host layouts

pub mod buffer;
pub mod nested;
pub mod types;

pub use buffer::{element_count, Tensor};
pub use nested::{HostArray, Nested};
pub use types::{MemoryLayout, TensorElement, TensorType};
