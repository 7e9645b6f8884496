//! Self-describing metadata fields
//!
//! Serialized form: one discriminant byte followed by the payload.
//! Scalars are fixed-width little-endian, strings are u32 length-prefixed
//! UTF-8, tensor-valued fields embed the tensor encoding.

use std::fmt;

use crate::tensor::Tensor;
use crate::utils::wire::{put_str, put_u8};
use crate::utils::{ClientError, DecodeError, WireReader};

/// Payload kind of a metadata field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MetaDataType {
    String = 1,
    Double = 2,
    Float = 3,
    Int64 = 4,
    Int32 = 5,
    UInt64 = 6,
    UInt32 = 7,
    Tensor = 8,
}

impl MetaDataType {
    pub const ALL: [MetaDataType; 8] = [
        MetaDataType::String,
        MetaDataType::Double,
        MetaDataType::Float,
        MetaDataType::Int64,
        MetaDataType::Int32,
        MetaDataType::UInt64,
        MetaDataType::UInt32,
        MetaDataType::Tensor,
    ];

    pub const fn discriminant(self) -> u8 {
        self as u8
    }

    pub fn from_discriminant(value: u8) -> Result<Self, DecodeError> {
        match value {
            1 => Ok(MetaDataType::String),
            2 => Ok(MetaDataType::Double),
            3 => Ok(MetaDataType::Float),
            4 => Ok(MetaDataType::Int64),
            5 => Ok(MetaDataType::Int32),
            6 => Ok(MetaDataType::UInt64),
            7 => Ok(MetaDataType::UInt32),
            8 => Ok(MetaDataType::Tensor),
            other => Err(DecodeError::UnknownMetaDataType(other)),
        }
    }

    /// Read the type of a serialized field from its first byte only
    pub fn of_buffer(buf: &[u8]) -> Result<Self, DecodeError> {
        let first = *buf.first().ok_or(DecodeError::Truncated {
            what: "metadata type",
            needed: 1,
            available: 0,
        })?;
        Self::from_discriminant(first)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            MetaDataType::String => "string",
            MetaDataType::Double => "double",
            MetaDataType::Float => "float",
            MetaDataType::Int64 => "int64",
            MetaDataType::Int32 => "int32",
            MetaDataType::UInt64 => "uint64",
            MetaDataType::UInt32 => "uint32",
            MetaDataType::Tensor => "tensor",
        }
    }
}

impl fmt::Display for MetaDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed payload of a metadata field
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Double(f64),
    Float(f32),
    Int64(i64),
    Int32(i32),
    UInt64(u64),
    UInt32(u32),
    Tensor(Tensor),
}

impl MetadataValue {
    pub fn meta_type(&self) -> MetaDataType {
        match self {
            MetadataValue::String(_) => MetaDataType::String,
            MetadataValue::Double(_) => MetaDataType::Double,
            MetadataValue::Float(_) => MetaDataType::Float,
            MetadataValue::Int64(_) => MetaDataType::Int64,
            MetadataValue::Int32(_) => MetaDataType::Int32,
            MetadataValue::UInt64(_) => MetaDataType::UInt64,
            MetadataValue::UInt32(_) => MetaDataType::UInt32,
            MetadataValue::Tensor(_) => MetaDataType::Tensor,
        }
    }
}

/// A named metadata value
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataField {
    name: String,
    value: MetadataValue,
}

impl MetadataField {
    /// A tensor value takes the field's name, which is all its encoding keeps
    pub fn new(name: impl Into<String>, value: MetadataValue) -> Self {
        let name = name.into();
        let value = match value {
            MetadataValue::Tensor(t) if t.name() != name => {
                MetadataValue::Tensor(t.renamed(name.clone()))
            }
            other => other,
        };
        Self { name, value }
    }

    pub fn scalar<T: MetaScalar>(name: impl Into<String>, value: T) -> Self {
        Self::new(name, value.into_value())
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, MetadataValue::String(value.into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta_type(&self) -> MetaDataType {
        self.value.meta_type()
    }

    pub fn value(&self) -> &MetadataValue {
        &self.value
    }

    pub fn into_value(self) -> MetadataValue {
        self.value
    }

    /// Discriminant byte followed by the type-specific payload
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16);
        put_u8(&mut buf, self.meta_type().discriminant());
        match &self.value {
            MetadataValue::String(s) => put_str(&mut buf, s),
            MetadataValue::Double(v) => buf.extend_from_slice(&v.to_le_bytes()),
            MetadataValue::Float(v) => buf.extend_from_slice(&v.to_le_bytes()),
            MetadataValue::Int64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            MetadataValue::Int32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            MetadataValue::UInt64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            MetadataValue::UInt32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            MetadataValue::Tensor(t) => t.encode_into(&mut buf),
        }
        buf
    }

    /// Rebuild a field from its serialized buffer
    ///
    /// The type comes from the leading byte alone; the rest must be exactly
    /// one payload of that type.
    pub fn deserialize(name: impl Into<String>, buf: &[u8]) -> Result<Self, DecodeError> {
        let name = name.into();
        let meta_type = MetaDataType::of_buffer(buf)?;
        let mut reader = WireReader::new(&buf[1..]);
        let value = match meta_type {
            MetaDataType::String => MetadataValue::String(reader.read_str("metadata string")?),
            MetaDataType::Double => MetadataValue::Double(reader.read_f64("metadata double")?),
            MetaDataType::Float => MetadataValue::Float(reader.read_f32("metadata float")?),
            MetaDataType::Int64 => MetadataValue::Int64(reader.read_i64("metadata int64")?),
            MetaDataType::Int32 => MetadataValue::Int32(reader.read_i32("metadata int32")?),
            MetaDataType::UInt64 => MetadataValue::UInt64(reader.read_u64("metadata uint64")?),
            MetaDataType::UInt32 => MetadataValue::UInt32(reader.read_u32("metadata uint32")?),
            MetaDataType::Tensor => {
                MetadataValue::Tensor(Tensor::decode_from(name.clone(), &mut reader)?)
            }
        };
        reader.finish("metadata field")?;
        Ok(Self { name, value })
    }
}

/// Scalar types accepted by the typed metadata helpers
pub trait MetaScalar: Copy + Sized {
    const TYPE: MetaDataType;

    fn into_value(self) -> MetadataValue;

    fn from_value(value: &MetadataValue) -> Option<Self>;
}

macro_rules! impl_meta_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl MetaScalar for $ty {
                const TYPE: MetaDataType = MetaDataType::$variant;

                fn into_value(self) -> MetadataValue {
                    MetadataValue::$variant(self)
                }

                fn from_value(value: &MetadataValue) -> Option<Self> {
                    match value {
                        MetadataValue::$variant(v) => Some(*v),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_meta_scalar!(
    f64 => Double,
    f32 => Float,
    i64 => Int64,
    i32 => Int32,
    u64 => UInt64,
    u32 => UInt32,
);

impl MetadataField {
    /// Typed scalar read; a different stored type is a mismatch
    pub fn get_scalar<T: MetaScalar>(&self) -> Result<T, ClientError> {
        T::from_value(&self.value)
            .ok_or_else(|| ClientError::meta_type_mismatch(&self.name, T::TYPE, self.meta_type()))
    }

    pub fn get_string(&self) -> Result<&str, ClientError> {
        match &self.value {
            MetadataValue::String(s) => Ok(s),
            other => Err(ClientError::meta_type_mismatch(
                &self.name,
                MetaDataType::String,
                other.meta_type(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(meta_type: MetaDataType) -> MetadataField {
        let value = match meta_type {
            MetaDataType::String => MetadataValue::String("timestep".to_string()),
            MetaDataType::Double => MetadataValue::Double(-1.25),
            MetaDataType::Float => MetadataValue::Float(3.5),
            MetaDataType::Int64 => MetadataValue::Int64(i64::MIN),
            MetaDataType::Int32 => MetadataValue::Int32(-9),
            MetaDataType::UInt64 => MetadataValue::UInt64(u64::MAX),
            MetaDataType::UInt32 => MetadataValue::UInt32(7),
            MetaDataType::Tensor => MetadataValue::Tensor(
                Tensor::from_slice("f", &[1.0f32, 2.0], vec![2]).unwrap(),
            ),
        };
        MetadataField::new("f", value)
    }

    #[test]
    fn test_int64_field_42() {
        let field = MetadataField::scalar("step", 42i64);
        let buf = field.serialize();
        assert_eq!(buf[0], MetaDataType::Int64.discriminant());
        assert_eq!(buf.len(), 9);
        let decoded = MetadataField::deserialize("step", &buf).unwrap();
        assert_eq!(decoded.get_scalar::<i64>().unwrap(), 42);
    }

    #[test]
    fn test_type_of_every_kind() {
        for meta_type in MetaDataType::ALL {
            let field = sample(meta_type);
            let buf = field.serialize();
            assert_eq!(MetaDataType::of_buffer(&buf).unwrap(), meta_type);
            assert_eq!(MetadataField::deserialize("f", &buf).unwrap(), field);
        }
    }

    #[test]
    fn test_type_of_ignores_payload() {
        // Only the first byte is inspected, even if the payload is garbage
        let buf = [MetaDataType::Double.discriminant(), 0xde, 0xad];
        assert_eq!(MetaDataType::of_buffer(&buf).unwrap(), MetaDataType::Double);
        assert!(MetadataField::deserialize("x", &buf).is_err());
    }

    #[test]
    fn test_unknown_discriminant() {
        assert_eq!(
            MetadataField::deserialize("x", &[0x7f, 0, 0, 0, 0]).unwrap_err(),
            DecodeError::UnknownMetaDataType(0x7f)
        );
        assert!(MetaDataType::of_buffer(&[]).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut buf = MetadataField::scalar("n", 5u32).serialize();
        buf.push(1);
        assert!(matches!(
            MetadataField::deserialize("n", &buf),
            Err(DecodeError::TrailingBytes { .. })
        ));
    }

    #[test]
    fn test_string_field() {
        let field = MetadataField::string("units", "kelvin");
        let decoded = MetadataField::deserialize("units", &field.serialize()).unwrap();
        assert_eq!(decoded.get_string().unwrap(), "kelvin");
        assert!(decoded.get_scalar::<f64>().is_err());
    }

    #[test]
    fn test_tensor_value_takes_field_name() {
        let inner = Tensor::from_slice("inner", &[1.5f32, 2.5], vec![2]).unwrap();
        let field = MetadataField::new("grid", MetadataValue::Tensor(inner));
        match field.value() {
            MetadataValue::Tensor(t) => assert_eq!(t.name(), "grid"),
            other => panic!("expected tensor value, got {:?}", other),
        }
        assert_eq!(MetadataField::deserialize("grid", &field.serialize()).unwrap(), field);
    }
}
