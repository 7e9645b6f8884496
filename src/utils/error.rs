//! Error types for silc

use std::io;
use thiserror::Error;

use crate::metadata::MetaDataType;
use crate::tensor::TensorType;

/// Top-level client error
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Malformed data: {0}")]
    Decode(#[from] DecodeError),

    #[error("Type mismatch for '{key}': expected {expected}, stored {actual}")]
    TypeMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("Shape mismatch for '{key}': expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        key: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Dataset already contains a tensor named '{0}'")]
    DuplicateTensor(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Routing and transport failures, the class a caller may retry
    pub fn is_connection(&self) -> bool {
        matches!(self, ClientError::Connection(_) | ClientError::Cluster(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    pub(crate) fn tensor_type_mismatch(key: &str, expected: TensorType, actual: TensorType) -> Self {
        ClientError::TypeMismatch {
            key: key.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub(crate) fn meta_type_mismatch(key: &str, expected: MetaDataType, actual: MetaDataType) -> Self {
        ClientError::TypeMismatch {
            key: key.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Malformed tensor, metadata or dataset buffers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown tensor type discriminant: {0}")]
    UnknownTensorType(u8),

    #[error("Unknown tensor type name: {0}")]
    UnknownTensorTypeName(String),

    #[error("Unknown metadata type discriminant: {0}")]
    UnknownMetaDataType(u8),

    #[error("Invalid shape {shape:?}: {reason}")]
    InvalidShape { shape: Vec<usize>, reason: String },

    #[error("Buffer length {actual} does not match shape {shape:?} of {ttype} ({expected} bytes)")]
    BufferLength {
        shape: Vec<usize>,
        ttype: TensorType,
        expected: usize,
        actual: usize,
    },

    #[error("Truncated {what}: need {needed} bytes, have {available}")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("{count} trailing bytes after {what}")]
    TrailingBytes { what: &'static str, count: usize },

    #[error("Invalid dataset magic: expected 0x{expected:08X}, got 0x{actual:08X}")]
    InvalidMagic { expected: u32, actual: u32 },

    #[error("Unsupported dataset version: {0}")]
    UnsupportedVersion(u16),

    #[error("Unknown dataset entry kind: {0}")]
    UnknownEntryKind(u8),

    #[error("Dataset entry '{name}' range {offset}+{length} exceeds body of {body} bytes")]
    EntryOutOfBounds {
        name: String,
        offset: u64,
        length: u64,
        body: usize,
    },

    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("Corrupt data: {0}")]
    Corrupt(String),
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to connect to {host}:{port}: {source}")]
    ConnectFailed {
        host: String,
        port: u16,
        source: io::Error,
    },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("IO error on {address}: {source}")]
    Io { address: String, source: io::Error },

    #[error("Connection closed unexpectedly")]
    Closed,
}

/// RESP protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Unexpected response to {command}: {actual}")]
    UnexpectedResponse { command: String, actual: String },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Too many redirects for key '{key}' (last: {last})")]
    TooManyRedirects { key: String, last: String },
}

/// Cluster-related errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("Failed to parse CLUSTER NODES response: {0}")]
    ParseFailed(String),

    #[error("No primary nodes found in cluster")]
    NoPrimaries,

    #[error("Slot {0} has no reachable node")]
    UnassignedSlot(u16),

    #[error("No seed address could be reached for topology discovery")]
    NoReachableSeed,
}

pub type Result<T> = std::result::Result<T, ClientError>;
