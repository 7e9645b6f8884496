//! Client-side command routing
//!
//! Routing is a pure function of the routing table and the key: no
//! round trip is made to decide where a command goes. The table only
//! changes when the server answers MOVED.

use tracing::debug;

use super::command::Command;
use crate::cluster::ClusterTopology;
use crate::config::ServerAddress;
use crate::utils::{ClusterError, Redirect};

/// How commands are mapped to nodes
#[derive(Debug, Clone)]
pub enum RoutingStrategy {
    /// Every command goes to one endpoint
    Standalone(ServerAddress),
    /// Commands go to the primary owning the key's hash slot
    Cluster(ClusterTopology),
}

#[derive(Debug, Clone)]
pub struct Router {
    strategy: RoutingStrategy,
}

impl Router {
    pub fn standalone(address: ServerAddress) -> Self {
        Self {
            strategy: RoutingStrategy::Standalone(address),
        }
    }

    pub fn cluster(topology: ClusterTopology) -> Self {
        Self {
            strategy: RoutingStrategy::Cluster(topology),
        }
    }

    /// Build a cluster router from a CLUSTER NODES reply
    pub fn from_cluster_nodes(response: &str) -> Result<Self, ClusterError> {
        Ok(Self::cluster(ClusterTopology::from_cluster_nodes(response)?))
    }

    pub fn strategy(&self) -> &RoutingStrategy {
        &self.strategy
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self.strategy, RoutingStrategy::Cluster(_))
    }

    /// Node a command must be sent to
    ///
    /// Unkeyed commands go to the first available primary.
    pub fn select(&self, command: &Command) -> Result<ServerAddress, ClusterError> {
        match command.routing_key() {
            Some(key) => self.node_for_key(key),
            None => self.any_node(),
        }
    }

    /// Node owning `key`; `{hash tags}` are honored
    pub fn node_for_key(&self, key: &[u8]) -> Result<ServerAddress, ClusterError> {
        match &self.strategy {
            RoutingStrategy::Standalone(address) => Ok(address.clone()),
            RoutingStrategy::Cluster(topology) => {
                let slot = ClusterTopology::slot_for_key(key);
                topology
                    .node_for_slot(slot)
                    .filter(|node| node.is_available())
                    .map(|node| node.address.clone())
                    .ok_or(ClusterError::UnassignedSlot(slot))
            }
        }
    }

    fn any_node(&self) -> Result<ServerAddress, ClusterError> {
        match &self.strategy {
            RoutingStrategy::Standalone(address) => Ok(address.clone()),
            RoutingStrategy::Cluster(topology) => topology
                .primaries()
                .find(|node| node.is_available())
                .map(|node| node.address.clone())
                .ok_or(ClusterError::NoPrimaries),
        }
    }

    /// Every distinct primary address
    pub fn primaries(&self) -> Vec<ServerAddress> {
        match &self.strategy {
            RoutingStrategy::Standalone(address) => vec![address.clone()],
            RoutingStrategy::Cluster(topology) => {
                topology.primaries().map(|n| n.address.clone()).collect()
            }
        }
    }

    /// Record a redirect and return the node to reissue to
    ///
    /// MOVED rewrites the slot owner; ASK leaves the table untouched.
    pub fn apply_redirect(&mut self, redirect: &Redirect) -> ServerAddress {
        let target = ServerAddress::new(redirect.host.clone(), redirect.port);
        if !redirect.is_ask {
            if let RoutingStrategy::Cluster(topology) = &mut self.strategy {
                debug!("Slot {} moved to {}", redirect.slot, target);
                topology.assign_slot(redirect.slot, target.clone());
            }
        }
        target
    }
}
