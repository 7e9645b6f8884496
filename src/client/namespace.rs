//! Ensemble key namespacing
//!
//! Members of an ensemble write under `<data_source>.<key>` so that
//! identically named tensors from different members do not collide.

use crate::config::ClientConfig;
use crate::utils::{ClientError, Result};

/// Separator between data source and logical key
pub const KEY_SEPARATOR: &str = ".";

/// Which prefix toggle governs a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// Tensors and datasets
    Tensor,
    /// Models and scripts
    Model,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    use_tensor_prefix: bool,
    use_model_prefix: bool,
    data_source: Option<String>,
}

impl Namespace {
    pub fn new(use_tensor_prefix: bool, use_model_prefix: bool, data_source: Option<String>) -> Self {
        Self {
            use_tensor_prefix,
            use_model_prefix,
            data_source,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.use_tensor_prefix,
            config.use_model_prefix,
            config.data_source.clone(),
        )
    }

    pub fn set_tensor_prefix(&mut self, enabled: bool) {
        self.use_tensor_prefix = enabled;
    }

    pub fn set_model_prefix(&mut self, enabled: bool) {
        self.use_model_prefix = enabled;
    }

    pub fn set_data_source(&mut self, source: impl Into<String>) -> Result<()> {
        let source = source.into();
        if source.is_empty() {
            return Err(ClientError::Config("data source must not be empty".to_string()));
        }
        self.data_source = Some(source);
        Ok(())
    }

    pub fn data_source(&self) -> Option<&str> {
        self.data_source.as_deref()
    }

    pub fn prefix_enabled(&self, class: KeyClass) -> bool {
        match class {
            KeyClass::Tensor => self.use_tensor_prefix,
            KeyClass::Model => self.use_model_prefix,
        }
    }

    /// Physical key for `logical` under the current settings
    pub fn build_key(&self, logical: &str, class: KeyClass) -> String {
        match self.data_source.as_deref() {
            Some(source) if self.prefix_enabled(class) => {
                let mut key =
                    String::with_capacity(source.len() + KEY_SEPARATOR.len() + logical.len());
                key.push_str(source);
                key.push_str(KEY_SEPARATOR);
                key.push_str(logical);
                key
            }
            _ => logical.to_string(),
        }
    }
}
