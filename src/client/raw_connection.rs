//! Raw TCP connection to one store node
//!
//! Commands are written through a buffered writer and replies are read
//! with the streaming RESP decoder.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::{AuthConfig, ClientConfig, ServerAddress};
use crate::router::Command;
use crate::utils::{ConnectionError, RespDecoder, RespEncoder, RespValue};

/// Split reader/writer over one TCP stream
pub struct RawConnection {
    address: ServerAddress,
    writer: BufWriter<TcpStream>,
    reader: BufReader<TcpStream>,
    encoder: RespEncoder,
}

impl RawConnection {
    /// Create new TCP connection
    pub fn connect_tcp(
        address: &ServerAddress,
        connect_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let connect_failed = |source: io::Error| ConnectionError::ConnectFailed {
            host: address.host.clone(),
            port: address.port,
            source,
        };

        // Resolve hostname to socket address
        let addr = (address.host.as_str(), address.port)
            .to_socket_addrs()
            .map_err(connect_failed)?
            .next()
            .ok_or_else(|| {
                connect_failed(io::Error::new(io::ErrorKind::NotFound, "No addresses found"))
            })?;

        let stream = TcpStream::connect_timeout(&addr, connect_timeout).map_err(connect_failed)?;

        // Disable Nagle's algorithm
        stream.set_nodelay(true).ok();

        let writer = BufWriter::with_capacity(65536, stream.try_clone().map_err(connect_failed)?);
        let reader = BufReader::with_capacity(65536, stream);

        Ok(Self {
            address: address.clone(),
            writer,
            reader,
            encoder: RespEncoder::with_capacity(4096),
        })
    }

    fn io_error(&self, source: io::Error) -> ConnectionError {
        if source.kind() == io::ErrorKind::UnexpectedEof {
            return ConnectionError::Closed;
        }
        ConnectionError::Io {
            address: self.address.to_string(),
            source,
        }
    }

    /// Send raw arguments and receive the reply
    pub fn execute_args<A: AsRef<[u8]>>(&mut self, args: &[A]) -> Result<RespValue, ConnectionError> {
        self.encoder.clear();
        self.encoder.encode_command(args);
        let sent = self
            .writer
            .write_all(self.encoder.as_bytes())
            .and_then(|_| self.writer.flush());
        if let Err(e) = sent {
            return Err(self.io_error(e));
        }
        let reply = RespDecoder::new(&mut self.reader).decode();
        reply.map_err(|e| self.io_error(e))
    }

    /// Send a command and receive the reply
    pub fn execute(&mut self, command: &Command) -> Result<RespValue, ConnectionError> {
        self.execute_args(command.args_slice())
    }

    /// Send AUTH command
    pub fn authenticate(&mut self, auth: &AuthConfig) -> Result<(), ConnectionError> {
        let response = match &auth.username {
            Some(user) => self.execute_args(&["AUTH", user.as_str(), auth.password.as_str()]),
            None => self.execute_args(&["AUTH", auth.password.as_str()]),
        }
        .map_err(|e| ConnectionError::AuthFailed(format!("IO error: {}", e)))?;

        match response {
            RespValue::SimpleString(s) if s == "OK" => Ok(()),
            RespValue::Error(e) => Err(ConnectionError::AuthFailed(e)),
            other => Err(ConnectionError::AuthFailed(format!(
                "Unexpected response: {}",
                other.describe()
            ))),
        }
    }

    /// Send SELECT command (for standalone mode)
    pub fn select_db(&mut self, db: u32) -> Result<RespValue, ConnectionError> {
        let mut buf = itoa::Buffer::new();
        self.execute_args(&["SELECT", buf.format(db)])
    }

    /// Send PING command
    pub fn ping(&mut self) -> Result<bool, ConnectionError> {
        match self.execute(&Command::ping())? {
            RespValue::SimpleString(s) => Ok(s == "PONG"),
            _ => Ok(false),
        }
    }

    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)
    }

    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.writer.get_ref().set_write_timeout(timeout)
    }
}

/// Connection factory for creating connections with common config
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub auth: Option<AuthConfig>,
    pub dbnum: Option<u32>,
}

impl ConnectionFactory {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_timeout: config.request_timeout(),
            write_timeout: config.request_timeout(),
            auth: config.auth.clone(),
            // SELECT is rejected by cluster nodes
            dbnum: config.dbnum.filter(|_| !config.cluster_mode),
        }
    }

    /// Create a new connection to the specified node
    pub fn create(&self, address: &ServerAddress) -> Result<RawConnection, ConnectionError> {
        let mut conn = RawConnection::connect_tcp(address, self.connect_timeout)?;

        conn.set_read_timeout(Some(self.read_timeout)).ok();
        conn.set_write_timeout(Some(self.write_timeout)).ok();

        if let Some(auth) = &self.auth {
            conn.authenticate(auth)?;
        }

        if let Some(db) = self.dbnum {
            if let RespValue::Error(e) = conn.select_db(db)? {
                return Err(ConnectionError::ConnectFailed {
                    host: address.host.clone(),
                    port: address.port,
                    source: io::Error::new(io::ErrorKind::Other, e),
                });
            }
        }

        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_skips_select_in_cluster_mode() {
        let config = ClientConfig {
            dbnum: Some(2),
            cluster_mode: true,
            ..ClientConfig::default()
        };
        assert_eq!(ConnectionFactory::from_config(&config).dbnum, None);

        let config = ClientConfig {
            dbnum: Some(2),
            ..ClientConfig::default()
        };
        let factory = ConnectionFactory::from_config(&config);
        assert_eq!(factory.dbnum, Some(2));
        assert_eq!(factory.read_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_connect_refused() {
        // Port 1 on localhost is essentially never listening
        let result = RawConnection::connect_tcp(
            &ServerAddress::new("127.0.0.1", 1),
            Duration::from_millis(200),
        );
        assert!(matches!(result, Err(ConnectionError::ConnectFailed { .. })));
    }

    // Note: These tests require a running server
    // They are marked as ignored by default

    #[test]
    #[ignore]
    fn test_tcp_connection() {
        let mut conn =
            RawConnection::connect_tcp(&ServerAddress::new("127.0.0.1", 6379), Duration::from_secs(5))
                .expect("Failed to connect");

        assert!(conn.ping().expect("Ping failed"));
    }

    #[test]
    #[ignore]
    fn test_connection_factory() {
        let factory = ConnectionFactory::from_config(&ClientConfig::default());
        let mut conn = factory
            .create(&ServerAddress::new("127.0.0.1", 6379))
            .expect("Failed to connect");
        assert!(conn.ping().expect("Ping failed"));
    }
}
