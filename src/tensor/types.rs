//! Tensor element types

use std::fmt;
use std::str::FromStr;

use crate::utils::DecodeError;

/// Element type of a tensor
///
/// The discriminant is the single byte written at the head of an encoded
/// tensor; the store name is what RedisAI expects in `AI.TENSORSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TensorType {
    Double = 1,
    Float = 2,
    Int64 = 3,
    Int32 = 4,
    Int16 = 5,
    Int8 = 6,
    UInt16 = 7,
    UInt8 = 8,
}

impl TensorType {
    pub const ALL: [TensorType; 8] = [
        TensorType::Double,
        TensorType::Float,
        TensorType::Int64,
        TensorType::Int32,
        TensorType::Int16,
        TensorType::Int8,
        TensorType::UInt16,
        TensorType::UInt8,
    ];

    /// Get element size in bytes
    pub const fn element_size(self) -> usize {
        match self {
            TensorType::Double | TensorType::Int64 => 8,
            TensorType::Float | TensorType::Int32 => 4,
            TensorType::Int16 | TensorType::UInt16 => 2,
            TensorType::Int8 | TensorType::UInt8 => 1,
        }
    }

    pub const fn discriminant(self) -> u8 {
        self as u8
    }

    /// Parse from wire discriminant; unknown values are rejected
    pub fn from_discriminant(value: u8) -> Result<Self, DecodeError> {
        match value {
            1 => Ok(TensorType::Double),
            2 => Ok(TensorType::Float),
            3 => Ok(TensorType::Int64),
            4 => Ok(TensorType::Int32),
            5 => Ok(TensorType::Int16),
            6 => Ok(TensorType::Int8),
            7 => Ok(TensorType::UInt16),
            8 => Ok(TensorType::UInt8),
            other => Err(DecodeError::UnknownTensorType(other)),
        }
    }

    /// Type name used by the store
    pub const fn as_str(self) -> &'static str {
        match self {
            TensorType::Double => "DOUBLE",
            TensorType::Float => "FLOAT",
            TensorType::Int64 => "INT64",
            TensorType::Int32 => "INT32",
            TensorType::Int16 => "INT16",
            TensorType::Int8 => "INT8",
            TensorType::UInt16 => "UINT16",
            TensorType::UInt8 => "UINT8",
        }
    }
}

impl fmt::Display for TensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TensorType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TensorType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DecodeError::UnknownTensorTypeName(s.to_string()))
    }
}

/// Host-side memory layout of a tensor
///
/// Only affects how data is copied in and out of the client; the wire
/// form is always contiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryLayout {
    #[default]
    Contiguous,
    Nested,
}

mod sealed {
    pub trait Sealed {}
}

/// Rust primitive that can be stored as a tensor element
pub trait TensorElement: Copy + PartialEq + fmt::Debug + sealed::Sealed {
    const TYPE: TensorType;

    fn write_le(self, out: &mut Vec<u8>);

    /// `bytes` is exactly `TYPE.element_size()` long
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_tensor_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl TensorElement for $ty {
                const TYPE: TensorType = TensorType::$variant;

                #[inline]
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_tensor_element!(
    f64 => Double,
    f32 => Float,
    i64 => Int64,
    i32 => Int32,
    i16 => Int16,
    i8 => Int8,
    u16 => UInt16,
    u8 => UInt8,
);
