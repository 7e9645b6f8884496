//! Cluster topology and hash-slot mapping

use super::node::{parse_cluster_node_line, ClusterNode};
use crate::config::ServerAddress;
use crate::utils::ClusterError;

/// Number of hash slots in a Redis cluster
pub const SLOT_COUNT: usize = 16384;

/// Cluster topology snapshot
#[derive(Debug, Clone)]
pub struct ClusterTopology {
    /// All nodes in the cluster
    nodes: Vec<ClusterNode>,
    /// Slot to node index mapping
    slot_map: Vec<Option<usize>>,
}

impl ClusterTopology {
    /// Parse CLUSTER NODES response
    pub fn from_cluster_nodes(response: &str) -> Result<Self, ClusterError> {
        let nodes: Vec<ClusterNode> = response
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                parse_cluster_node_line(line)
                    .ok_or_else(|| ClusterError::ParseFailed(line.trim().to_string()))
            })
            .collect::<Result<_, _>>()?;

        if !nodes.iter().any(|n| n.is_primary) {
            return Err(ClusterError::NoPrimaries);
        }

        let mut slot_map = vec![None; SLOT_COUNT];
        for (idx, node) in nodes.iter().enumerate().filter(|(_, n)| n.is_primary) {
            for &(start, end) in &node.slot_ranges {
                let entries = slot_map
                    .get_mut(start as usize..=end as usize)
                    .ok_or_else(|| ClusterError::ParseFailed(format!("slot range {}-{}", start, end)))?;
                entries.fill(Some(idx));
            }
        }

        Ok(Self { nodes, slot_map })
    }

    /// Get node for slot
    pub fn node_for_slot(&self, slot: u16) -> Option<&ClusterNode> {
        self.slot_map
            .get(slot as usize)
            .copied()
            .flatten()
            .map(|idx| &self.nodes[idx])
    }

    /// Point `slot` at `address`, adding the node if it is new
    ///
    /// Used when the server answers MOVED for a slot.
    pub fn assign_slot(&mut self, slot: u16, address: ServerAddress) {
        let idx = match self.nodes.iter().position(|n| n.address == address) {
            Some(idx) => idx,
            None => {
                self.nodes.push(ClusterNode {
                    id: address.to_string(),
                    address,
                    is_primary: true,
                    primary_id: None,
                    slot_ranges: Vec::new(),
                    flags: vec!["master".to_string()],
                    connected: true,
                });
                self.nodes.len() - 1
            }
        };
        if let Some(entry) = self.slot_map.get_mut(slot as usize) {
            *entry = Some(idx);
        }
    }

    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    /// Get all primary nodes
    pub fn primaries(&self) -> impl Iterator<Item = &ClusterNode> {
        self.nodes.iter().filter(|n| n.is_primary)
    }

    pub fn num_primaries(&self) -> usize {
        self.primaries().count()
    }

    /// Calculate slot for key using CRC16, honoring `{hash tags}`
    pub fn slot_for_key(key: &[u8]) -> u16 {
        crc16(hash_tag(key).unwrap_or(key)) % SLOT_COUNT as u16
    }
}

/// Contents of the first non-empty `{...}` section, if any
pub fn hash_tag(key: &[u8]) -> Option<&[u8]> {
    let start = key.iter().position(|&b| b == b'{')?;
    let len = key[start + 1..].iter().position(|&b| b == b'}')?;
    (len > 0).then(|| &key[start + 1..start + 1 + len])
}

/// CRC16 implementation for Redis cluster slot calculation (XMODEM)
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
