//! Cluster topology and node management
//!
//! - Topology discovery via CLUSTER NODES
//! - Slot mapping and CRC16 calculation
//! - Slot reassignment on MOVED replies

pub mod node;
pub mod topology;

pub use node::ClusterNode;
pub use topology::{hash_tag, ClusterTopology, SLOT_COUNT};
