//! Nested (row-of-rows) host representation

use super::types::{MemoryLayout, TensorElement};
use crate::utils::ClientError;

/// One level of a nested array
///
/// `Values` holds the innermost dimension; each `Rows` level holds one
/// separately allocated child per outer index.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested<T> {
    Values(Vec<T>),
    Rows(Vec<Nested<T>>),
}

impl<T: TensorElement> Nested<T> {
    /// Split a row-major buffer into rows following `shape`
    ///
    /// Callers guarantee `values.len() == product(shape)`.
    pub fn from_flat(values: &[T], shape: &[usize]) -> Self {
        match shape {
            [] | [_] => Nested::Values(values.to_vec()),
            [_, inner @ ..] => {
                let row_len: usize = inner.iter().product();
                Nested::Rows(
                    values
                        .chunks(row_len.max(1))
                        .map(|row| Nested::from_flat(row, inner))
                        .collect(),
                )
            }
        }
    }

    /// Copy into a row-major buffer, checking every level against `shape`
    pub fn flatten(&self, name: &str, shape: &[usize]) -> Result<Vec<T>, ClientError> {
        let total: usize = shape.iter().product();
        let mut out = Vec::with_capacity(total);
        self.flatten_into(name, shape, shape, &mut out)?;
        Ok(out)
    }

    fn flatten_into(
        &self,
        name: &str,
        full_shape: &[usize],
        shape: &[usize],
        out: &mut Vec<T>,
    ) -> Result<(), ClientError> {
        let mismatch = |actual_len: usize| {
            let depth = full_shape.len() - shape.len();
            let mut actual = full_shape.to_vec();
            if depth < actual.len() {
                actual[depth] = actual_len;
            }
            ClientError::ShapeMismatch {
                key: name.to_string(),
                expected: full_shape.to_vec(),
                actual,
            }
        };

        match (self, shape) {
            (Nested::Values(values), [len]) => {
                if values.len() != *len {
                    return Err(mismatch(values.len()));
                }
                out.extend_from_slice(values);
                Ok(())
            }
            (Nested::Rows(rows), [len, inner @ ..]) if !inner.is_empty() => {
                if rows.len() != *len {
                    return Err(mismatch(rows.len()));
                }
                for row in rows {
                    row.flatten_into(name, full_shape, inner, out)?;
                }
                Ok(())
            }
            (Nested::Values(values), _) => Err(mismatch(values.len())),
            (Nested::Rows(rows), _) => Err(mismatch(rows.len())),
        }
    }

    /// Number of nesting levels (1 for a flat row)
    pub fn depth(&self) -> usize {
        match self {
            Nested::Values(_) => 1,
            Nested::Rows(rows) => 1 + rows.first().map(Nested::depth).unwrap_or(0),
        }
    }
}

/// Host data in one of the two supported layouts
#[derive(Debug, Clone, PartialEq)]
pub enum HostArray<T> {
    Contiguous(Vec<T>),
    Nested(Nested<T>),
}

impl<T> HostArray<T> {
    pub fn layout(&self) -> MemoryLayout {
        match self {
            HostArray::Contiguous(_) => MemoryLayout::Contiguous,
            HostArray::Nested(_) => MemoryLayout::Nested,
        }
    }
}
