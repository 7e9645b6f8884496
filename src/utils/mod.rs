//! Utility modules

pub mod error;
pub mod resp;
pub mod wire;

pub use error::{
    ClientError, ClusterError, ConnectionError, DecodeError, ProtocolError, Result,
};
pub use resp::{Redirect, RespDecoder, RespEncoder, RespValue};
pub use wire::WireReader;
