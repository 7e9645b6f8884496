//! Tensor value object and its wire encoding
//!
//! Encoded form (little-endian):
//!
//! ```text
//! u8       type discriminant
//! u32      number of dimensions (>= 1)
//! u64 * n  dimension sizes (each >= 1)
//! [u8]     payload, product(dims) * element_size bytes
//! ```

use super::nested::{HostArray, Nested};
use super::types::{TensorElement, TensorType};
use crate::utils::wire::{put_u32, put_u64, put_u8};
use crate::utils::{ClientError, DecodeError, WireReader};

/// Bytes before the dimension list
const FIXED_HEADER_LEN: usize = 1 + 4;

/// A named, single-typed multi-dimensional array
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    name: String,
    ttype: TensorType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

/// Number of elements for `shape`, rejecting empty shapes, zero
/// dimensions and overflow
pub fn element_count(shape: &[usize]) -> Result<usize, DecodeError> {
    if shape.is_empty() {
        return Err(DecodeError::InvalidShape {
            shape: shape.to_vec(),
            reason: "at least one dimension is required".to_string(),
        });
    }
    shape.iter().try_fold(1usize, |acc, &dim| {
        if dim == 0 {
            return Err(DecodeError::InvalidShape {
                shape: shape.to_vec(),
                reason: "dimensions must be greater than zero".to_string(),
            });
        }
        acc.checked_mul(dim).ok_or_else(|| DecodeError::InvalidShape {
            shape: shape.to_vec(),
            reason: "element count overflows".to_string(),
        })
    })
}

fn byte_len(shape: &[usize], ttype: TensorType) -> Result<usize, DecodeError> {
    element_count(shape)?
        .checked_mul(ttype.element_size())
        .ok_or_else(|| DecodeError::InvalidShape {
            shape: shape.to_vec(),
            reason: "byte length overflows".to_string(),
        })
}

impl Tensor {
    /// Build from raw little-endian element bytes
    ///
    /// The buffer must hold exactly `product(shape) * element_size` bytes.
    pub fn from_bytes(
        name: impl Into<String>,
        ttype: TensorType,
        shape: Vec<usize>,
        data: Vec<u8>,
    ) -> Result<Self, DecodeError> {
        let expected = byte_len(&shape, ttype)?;
        if data.len() != expected {
            return Err(DecodeError::BufferLength {
                shape,
                ttype,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            ttype,
            shape,
            data,
        })
    }

    /// Build from a row-major slice of typed values
    pub fn from_slice<T: TensorElement>(
        name: impl Into<String>,
        values: &[T],
        shape: Vec<usize>,
    ) -> Result<Self, DecodeError> {
        let mut data = Vec::with_capacity(values.len() * T::TYPE.element_size());
        for &v in values {
            v.write_le(&mut data);
        }
        Self::from_bytes(name, T::TYPE, shape, data)
    }

    /// Build from a nested row hierarchy, checked against `shape`
    pub fn from_nested<T: TensorElement>(
        name: impl Into<String>,
        nested: &Nested<T>,
        shape: Vec<usize>,
    ) -> Result<Self, ClientError> {
        let name = name.into();
        let values = nested.flatten(&name, &shape)?;
        Ok(Self::from_slice(name, &values, shape)?)
    }

    pub fn from_host<T: TensorElement>(
        name: impl Into<String>,
        host: &HostArray<T>,
        shape: Vec<usize>,
    ) -> Result<Self, ClientError> {
        match host {
            HostArray::Contiguous(values) => Ok(Self::from_slice(name, values, shape)?),
            HostArray::Nested(nested) => Self::from_nested(name, nested, shape),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tensor_type(&self) -> TensorType {
        self.ttype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn num_elements(&self) -> usize {
        self.data.len() / self.ttype.element_size()
    }

    /// Raw little-endian payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Same tensor under a different name
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn check_type<T: TensorElement>(&self) -> Result<(), ClientError> {
        if T::TYPE != self.ttype {
            return Err(ClientError::tensor_type_mismatch(
                &self.name, T::TYPE, self.ttype,
            ));
        }
        Ok(())
    }

    /// Copy out the elements in row-major order
    pub fn to_vec<T: TensorElement>(&self) -> Result<Vec<T>, ClientError> {
        self.check_type::<T>()?;
        Ok(self
            .data
            .chunks_exact(self.ttype.element_size())
            .map(T::read_le)
            .collect())
    }

    /// Copy out as a hierarchy of row buffers, one level per dimension
    pub fn to_nested<T: TensorElement>(&self) -> Result<Nested<T>, ClientError> {
        let values = self.to_vec::<T>()?;
        Ok(Nested::from_flat(&values, &self.shape))
    }

    /// Encode as type + shape + payload
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        put_u8(buf, self.ttype.discriminant());
        put_u32(buf, self.shape.len() as u32);
        for &dim in &self.shape {
            put_u64(buf, dim as u64);
        }
        buf.extend_from_slice(&self.data);
    }

    pub fn encoded_len(&self) -> usize {
        FIXED_HEADER_LEN + 8 * self.shape.len() + self.data.len()
    }

    /// Decode a buffer produced by [`Tensor::encode`]
    ///
    /// The buffer must contain exactly one tensor.
    pub fn decode(name: impl Into<String>, bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = WireReader::new(bytes);
        let tensor = Self::decode_from(name, &mut reader)?;
        reader.finish("tensor payload")?;
        Ok(tensor)
    }

    pub(crate) fn decode_from(
        name: impl Into<String>,
        reader: &mut WireReader<'_>,
    ) -> Result<Self, DecodeError> {
        let ttype = TensorType::from_discriminant(reader.read_u8("tensor type")?)?;
        let ndims = reader.read_u32("tensor rank")? as usize;
        // Eight bytes per dimension must be present before allocating
        if ndims.saturating_mul(8) > reader.remaining() {
            return Err(DecodeError::Truncated {
                what: "tensor shape",
                needed: ndims.saturating_mul(8),
                available: reader.remaining(),
            });
        }
        let mut shape = Vec::with_capacity(ndims);
        for _ in 0..ndims {
            let dim = reader.read_u64("tensor dimension")?;
            let dim = usize::try_from(dim).map_err(|_| {
                DecodeError::Corrupt(format!("dimension {} does not fit in usize", dim))
            })?;
            shape.push(dim);
        }
        let len = byte_len(&shape, ttype)?;
        let data = reader.take(len, "tensor payload")?.to_vec();
        Self::from_bytes(name, ttype, shape, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern_f32(n: usize) -> Vec<f32> {
        (0..n).map(|i| i as f32 * 0.5 - 3.0).collect()
    }

    #[test]
    fn test_encode_decode_float_10x5() {
        let values = pattern_f32(50);
        let tensor = Tensor::from_slice("temperature", &values, vec![10, 5]).unwrap();
        let decoded = Tensor::decode("temperature", &tensor.encode()).unwrap();
        assert_eq!(decoded, tensor);
        assert_eq!(decoded.to_vec::<f32>().unwrap(), values);
    }

    #[test]
    fn test_roundtrip_every_type() {
        let shape = vec![3, 2, 2];
        let tensors = vec![
            Tensor::from_slice("d", &[1.5f64; 12], shape.clone()).unwrap(),
            Tensor::from_slice("i64", &[i64::MIN; 12], shape.clone()).unwrap(),
            Tensor::from_slice("i32", &[-7i32; 12], shape.clone()).unwrap(),
            Tensor::from_slice("i16", &[i16::MAX; 12], shape.clone()).unwrap(),
            Tensor::from_slice("i8", &[-1i8; 12], shape.clone()).unwrap(),
            Tensor::from_slice("u16", &[65535u16; 12], shape.clone()).unwrap(),
            Tensor::from_slice("u8", &[200u8; 12], shape.clone()).unwrap(),
        ];
        for tensor in tensors {
            let decoded = Tensor::decode(tensor.name(), &tensor.encode()).unwrap();
            assert_eq!(decoded, tensor);
        }
    }

    #[test]
    fn test_encoded_header_layout() {
        let tensor = Tensor::from_slice("t", &[1u8, 2, 3], vec![3]).unwrap();
        let bytes = tensor.encode();
        assert_eq!(bytes[0], TensorType::UInt8.discriminant());
        assert_eq!(&bytes[1..5], &1u32.to_le_bytes());
        assert_eq!(&bytes[5..13], &3u64.to_le_bytes());
        assert_eq!(&bytes[13..], &[1, 2, 3]);
        assert_eq!(bytes.len(), tensor.encoded_len());
    }

    #[test]
    fn test_buffer_length_mismatch_rejected() {
        let err = Tensor::from_bytes("t", TensorType::Float, vec![2, 2], vec![0u8; 15]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BufferLength {
                shape: vec![2, 2],
                ttype: TensorType::Float,
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn test_zero_and_empty_shapes_rejected() {
        assert!(matches!(
            Tensor::from_slice::<f64>("t", &[], vec![0, 3]),
            Err(DecodeError::InvalidShape { .. })
        ));
        assert!(matches!(
            Tensor::from_slice::<f64>("t", &[], vec![]),
            Err(DecodeError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let tensor = Tensor::from_slice("t", &[1i32, 2, 3, 4], vec![4]).unwrap();
        let bytes = tensor.encode();
        let err = Tensor::decode("t", &bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { what: "tensor payload", .. }));
    }

    #[test]
    fn test_decode_trailing_bytes() {
        let mut bytes = Tensor::from_slice("t", &[9u8], vec![1]).unwrap().encode();
        bytes.push(0);
        assert!(matches!(
            Tensor::decode("t", &bytes),
            Err(DecodeError::TrailingBytes { count: 1, .. })
        ));
    }

    #[test]
    fn test_decode_unknown_type() {
        let mut bytes = Tensor::from_slice("t", &[9u8], vec![1]).unwrap().encode();
        bytes[0] = 42;
        assert_eq!(
            Tensor::decode("t", &bytes).unwrap_err(),
            DecodeError::UnknownTensorType(42)
        );
    }

    #[test]
    fn test_decode_huge_rank_does_not_allocate() {
        let mut bytes = vec![TensorType::UInt8.discriminant()];
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            Tensor::decode("t", &bytes),
            Err(DecodeError::Truncated { what: "tensor shape", .. })
        ));
    }

    #[test]
    fn test_typed_read_mismatch() {
        let tensor = Tensor::from_slice("t", &[1.0f64, 2.0], vec![2]).unwrap();
        let err = tensor.to_vec::<f32>().unwrap_err();
        assert!(matches!(err, ClientError::TypeMismatch { ref key, .. } if key == "t"));
    }

    #[test]
    fn test_input_buffer_not_modified() {
        let values = vec![3i64, 1, 4, 1, 5, 9];
        let copy = values.clone();
        let tensor = Tensor::from_slice("pi", &values, vec![2, 3]).unwrap();
        drop(tensor);
        assert_eq!(values, copy);
    }
}
