//! Transport seam between the client and store connections

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::raw_connection::{ConnectionFactory, RawConnection};
use crate::config::ServerAddress;
use crate::router::Command;
use crate::utils::{ConnectionError, RespValue};

/// Sends commands to named nodes
///
/// Implementations own connection management; routing decisions are
/// made by the caller.
pub trait Transport: Send + Sync {
    /// Send `command` to `node` and return the raw reply
    fn execute(&self, node: &ServerAddress, command: &Command) -> Result<RespValue, ConnectionError>;

    /// Send `ASKING` followed by `command` on the same connection
    fn execute_asking(
        &self,
        node: &ServerAddress,
        command: &Command,
    ) -> Result<RespValue, ConnectionError>;
}

/// One lazily opened connection per node
pub struct ConnectionPool {
    factory: ConnectionFactory,
    connections: Mutex<HashMap<ServerAddress, Arc<Mutex<RawConnection>>>>,
}

impl ConnectionPool {
    pub fn new(factory: ConnectionFactory) -> Self {
        Self {
            factory,
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn factory(&self) -> &ConnectionFactory {
        &self.factory
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn connection(&self, node: &ServerAddress) -> Result<Arc<Mutex<RawConnection>>, ConnectionError> {
        if let Some(conn) = self.connections.lock().get(node) {
            return Ok(Arc::clone(conn));
        }

        // Connect outside the map lock; a racing thread may also connect
        debug!("Opening connection to {}", node);
        let conn = Arc::new(Mutex::new(self.factory.create(node)?));
        let mut connections = self.connections.lock();
        Ok(Arc::clone(connections.entry(node.clone()).or_insert(conn)))
    }

    fn with_connection<F>(&self, node: &ServerAddress, f: F) -> Result<RespValue, ConnectionError>
    where
        F: FnOnce(&mut RawConnection) -> Result<RespValue, ConnectionError>,
    {
        let conn = self.connection(node)?;
        let result = f(&mut conn.lock());
        if let Err(e) = &result {
            // A failed stream may be mid-reply; never reuse it
            warn!("Dropping connection to {}: {}", node, e);
            self.connections.lock().remove(node);
        }
        result
    }
}

impl Transport for ConnectionPool {
    fn execute(&self, node: &ServerAddress, command: &Command) -> Result<RespValue, ConnectionError> {
        self.with_connection(node, |conn| conn.execute(command))
    }

    fn execute_asking(
        &self,
        node: &ServerAddress,
        command: &Command,
    ) -> Result<RespValue, ConnectionError> {
        self.with_connection(node, |conn| {
            conn.execute(&Command::asking())?;
            conn.execute(command)
        })
    }
}
