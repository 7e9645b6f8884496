//! Cluster node representation

use super::topology::SLOT_COUNT;
use crate::config::ServerAddress;

/// One line of CLUSTER NODES
#[derive(Debug, Clone)]
pub struct ClusterNode {
    /// Node ID from CLUSTER NODES
    pub id: String,
    pub address: ServerAddress,
    pub is_primary: bool,
    /// Primary node ID (if replica)
    pub primary_id: Option<String>,
    /// Inclusive slot ranges served by a primary
    pub slot_ranges: Vec<(u16, u16)>,
    /// Node flags (fail, handshake, etc.)
    pub flags: Vec<String>,
    /// Link state was "connected"
    pub connected: bool,
}

impl ClusterNode {
    pub fn is_available(&self) -> bool {
        self.connected && !self.flags.iter().any(|f| f == "fail" || f == "handshake")
    }
}

/// Parse a line from CLUSTER NODES response
///
/// Format: `<id> <ip:port@cport> <flags> <master> <ping-sent> <pong-recv> <config-epoch> <link-state> <slot> <slot> ... <slot>`
pub fn parse_cluster_node_line(line: &str) -> Option<ClusterNode> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 8 {
        return None;
    }

    let address = parse_node_address(parts[1])?;
    let flags: Vec<String> = parts[2].split(',').map(String::from).collect();

    let is_primary = flags.iter().any(|f| f == "master");
    let is_replica = flags.iter().any(|f| f == "slave" || f == "replica");

    let primary_id = if is_replica && parts[3] != "-" {
        Some(parts[3].to_string())
    } else {
        None
    };

    // Migrating/importing entries like "[123->-node_id]" carry no ownership
    let slot_ranges = if is_primary {
        parts[8..]
            .iter()
            .filter(|s| !s.starts_with('['))
            .map(|s| parse_slot_range(s))
            .collect::<Option<Vec<_>>>()?
    } else {
        Vec::new()
    };

    Some(ClusterNode {
        id: parts[0].to_string(),
        address,
        is_primary,
        primary_id,
        slot_ranges,
        flags,
        connected: parts[7] == "connected",
    })
}

/// Parse node address from CLUSTER NODES
/// Formats: "host:port@cport", "host:port", "host:port@cport,hostname"
fn parse_node_address(addr: &str) -> Option<ServerAddress> {
    let addr = addr.split(',').next().unwrap_or(addr);
    let host_port = addr.split('@').next().unwrap_or(addr);
    let (host, port) = host_port.rsplit_once(':')?;
    Some(ServerAddress {
        host: host.to_string(),
        port: port.parse().ok()?,
    })
}

/// Parse slot range: "0-5460" or "0"
///
/// Both ends must be valid slots and the range must not be reversed.
fn parse_slot_range(s: &str) -> Option<(u16, u16)> {
    let (start, end) = match s.split_once('-') {
        Some((start, end)) => (start.parse::<u16>().ok()?, end.parse::<u16>().ok()?),
        None => {
            let slot: u16 = s.parse().ok()?;
            (slot, slot)
        }
    };
    (start <= end && (end as usize) < SLOT_COUNT).then_some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primary_node() {
        let line = "07c37dfeb235213a872192d90877d0cd55635b91 127.0.0.1:30001@31001 master - 0 1426238316232 1 connected 0-5460";
        let node = parse_cluster_node_line(line).unwrap();

        assert_eq!(node.id, "07c37dfeb235213a872192d90877d0cd55635b91");
        assert_eq!(node.address.host, "127.0.0.1");
        assert_eq!(node.address.port, 30001);
        assert!(node.is_primary);
        assert!(node.is_available());
        assert_eq!(node.slot_ranges, vec![(0, 5460)]);
    }

    #[test]
    fn test_parse_replica_node() {
        let line = "292f8b365bb7edb5e285caf0b7e6ddc7265d2f4f 127.0.0.1:30004@31004 slave e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca 0 1426238317239 4 connected";
        let node = parse_cluster_node_line(line).unwrap();

        assert!(!node.is_primary);
        assert_eq!(
            node.primary_id.as_deref(),
            Some("e7d1eecce10fd6bb5eb35b9f99a514335d9ba9ca")
        );
        assert!(node.slot_ranges.is_empty());
    }

    #[test]
    fn test_failed_node_unavailable() {
        let line = "abc 10.0.0.9:6379@16379 master,fail - 0 0 3 disconnected 100-200";
        let node = parse_cluster_node_line(line).unwrap();
        assert!(!node.is_available());
    }

    #[test]
    fn test_parse_node_address_variants() {
        let addr = parse_node_address("10.0.0.1:6379@16379,hostname.example.com").unwrap();
        assert_eq!(addr.host, "10.0.0.1");
        assert_eq!(addr.port, 6379);
        assert_eq!(parse_node_address("127.0.0.1:7000").unwrap().port, 7000);
        assert!(parse_node_address("nonsense").is_none());
    }

    #[test]
    fn test_parse_slot_range() {
        assert_eq!(parse_slot_range("0-5460"), Some((0, 5460)));
        assert_eq!(parse_slot_range("5461"), Some((5461, 5461)));
        assert_eq!(parse_slot_range("16383"), Some((16383, 16383)));
    }

    #[test]
    fn test_parse_slot_range_rejects_out_of_bounds() {
        assert_eq!(parse_slot_range("200-100"), None);
        assert_eq!(parse_slot_range("20000"), None);
        assert_eq!(parse_slot_range("16000-16384"), None);
        assert_eq!(parse_slot_range("abc"), None);
    }

    #[test]
    fn test_migrating_slots_skipped() {
        let line = "abc 10.0.0.9:6379@16379 master - 0 0 3 connected 0-99 [100->-def] [101-<-ghi]";
        let node = parse_cluster_node_line(line).unwrap();
        assert_eq!(node.slot_ranges, vec![(0, 99)]);
    }

    #[test]
    fn test_bad_slot_range_rejects_line() {
        let line = "abc 10.0.0.9:6379@16379 master - 0 0 3 connected 0-99 200-100";
        assert!(parse_cluster_node_line(line).is_none());
        let line = "abc 10.0.0.9:6379@16379 master - 0 0 3 connected 20000";
        assert!(parse_cluster_node_line(line).is_none());
    }
}
