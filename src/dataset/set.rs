//! Dataset: tensors and metadata stored as one object

use crate::metadata::{MetaScalar, MetadataField, MetadataValue};
use crate::tensor::{Tensor, TensorElement};
use crate::utils::{ClientError, Result};

/// A named aggregate of tensors and metadata fields
///
/// Tensors and metadata names keep their insertion order, which fixes the
/// packed byte layout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSet {
    name: String,
    tensors: Vec<Tensor>,
    metadata: Vec<(String, Vec<MetadataField>)>,
}

impl DataSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tensors: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty() && self.metadata.is_empty()
    }

    /// Add a tensor; names must be unique within the dataset
    pub fn add_tensor(&mut self, tensor: Tensor) -> Result<()> {
        if self.has_tensor(tensor.name()) {
            return Err(ClientError::DuplicateTensor(tensor.name().to_string()));
        }
        self.tensors.push(tensor);
        Ok(())
    }

    /// Convenience wrapper building the tensor from a typed slice
    pub fn add_tensor_from_slice<T: TensorElement>(
        &mut self,
        name: &str,
        values: &[T],
        shape: Vec<usize>,
    ) -> Result<()> {
        self.add_tensor(Tensor::from_slice(name, values, shape)?)
    }

    pub fn has_tensor(&self, name: &str) -> bool {
        self.tensors.iter().any(|t| t.name() == name)
    }

    pub fn get_tensor(&self, name: &str) -> Result<&Tensor> {
        self.tensors
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ClientError::NotFound(format!("{}.{}", self.name, name)))
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn tensor_names(&self) -> impl Iterator<Item = &str> {
        self.tensors.iter().map(Tensor::name)
    }

    /// Append a value to the metadata list for the field's name
    ///
    /// Every value under one name must share a type.
    pub fn add_metadata(&mut self, field: MetadataField) -> Result<()> {
        match self.metadata.iter_mut().find(|(name, _)| name == field.name()) {
            Some((name, values)) => {
                let stored = values[0].meta_type();
                if stored != field.meta_type() {
                    return Err(ClientError::meta_type_mismatch(
                        name,
                        field.meta_type(),
                        stored,
                    ));
                }
                values.push(field);
            }
            None => self
                .metadata
                .push((field.name().to_string(), vec![field])),
        }
        Ok(())
    }

    pub fn add_meta_scalar<T: MetaScalar>(&mut self, name: &str, value: T) -> Result<()> {
        self.add_metadata(MetadataField::scalar(name, value))
    }

    pub fn add_meta_string(&mut self, name: &str, value: &str) -> Result<()> {
        self.add_metadata(MetadataField::string(name, value))
    }

    pub fn has_meta(&self, name: &str) -> bool {
        self.metadata.iter().any(|(n, _)| n == name)
    }

    /// All values recorded under `name`, in append order
    pub fn get_meta(&self, name: &str) -> Result<&[MetadataField]> {
        self.metadata
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values.as_slice())
            .ok_or_else(|| ClientError::NotFound(format!("{}.{}", self.name, name)))
    }

    pub fn get_meta_scalars<T: MetaScalar>(&self, name: &str) -> Result<Vec<T>> {
        self.get_meta(name)?
            .iter()
            .map(MetadataField::get_scalar::<T>)
            .collect()
    }

    pub fn get_meta_strings(&self, name: &str) -> Result<Vec<String>> {
        self.get_meta(name)?
            .iter()
            .map(|f| f.get_string().map(str::to_string))
            .collect()
    }

    /// Tensor-valued metadata under `name`
    pub fn get_meta_tensors(&self, name: &str) -> Result<Vec<&Tensor>> {
        self.get_meta(name)?
            .iter()
            .map(|f| match f.value() {
                MetadataValue::Tensor(t) => Ok(t),
                other => Err(ClientError::meta_type_mismatch(
                    name,
                    crate::metadata::MetaDataType::Tensor,
                    other.meta_type(),
                )),
            })
            .collect()
    }

    pub fn meta_names(&self) -> impl Iterator<Item = &str> {
        self.metadata.iter().map(|(n, _)| n.as_str())
    }

    pub(crate) fn metadata_lists(&self) -> &[(String, Vec<MetadataField>)] {
        &self.metadata
    }
}
