//! Client configuration

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::{ClientError, Result};

/// Environment variable holding the store address list (`host:port[,host:port...]`)
pub const ENV_DB_ADDRESS: &str = "SSDB";

/// Environment variable holding the ensemble member identifier used as data source
pub const ENV_KEY_OUT: &str = "SSKEYOUT";

/// Resolved server address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
}

impl ServerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerAddress {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| ClientError::Config(format!("address '{}' is not host:port", s)))?;
        if host.is_empty() {
            return Err(ClientError::Config(format!("address '{}' has no host", s)));
        }
        let port = port
            .parse()
            .map_err(|_| ClientError::Config(format!("invalid port in address '{}'", s)))?;
        Ok(Self::new(host, port))
    }
}

impl TryFrom<String> for ServerAddress {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ServerAddress> for String {
    fn from(value: ServerAddress) -> Self {
        value.to_string()
    }
}

/// Authentication configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Complete client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // Connection
    pub addresses: Vec<ServerAddress>,
    pub auth: Option<AuthConfig>,
    pub dbnum: Option<u32>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,

    // Routing
    pub cluster_mode: bool,
    pub max_redirects: u32,

    // Ensemble namespacing
    pub use_tensor_prefix: bool,
    pub use_model_prefix: bool,
    pub data_source: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addresses: vec![ServerAddress::new("127.0.0.1", 6379)],
            auth: None,
            dbnum: None,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 30_000,
            cluster_mode: false,
            max_redirects: 3,
            use_tensor_prefix: false,
            use_model_prefix: false,
            data_source: None,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `SSDB` / `SSKEYOUT` from the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Load a JSON configuration file; missing fields take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            ClientError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment values looked up through `lookup`
    ///
    /// A data source taken from the environment also turns on tensor
    /// prefixing, so ensemble members are isolated without extra calls.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_DB_ADDRESS).filter(|v| !v.trim().is_empty()) {
            self.addresses = raw
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<ServerAddress>())
                .collect::<Result<_>>()?;
        }
        if let Some(source) = lookup(ENV_KEY_OUT).filter(|v| !v.is_empty()) {
            self.data_source = Some(source);
            self.use_tensor_prefix = true;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.addresses.is_empty() {
            return Err(ClientError::Config(
                "at least one server address is required".to_string(),
            ));
        }
        if matches!(self.data_source.as_deref(), Some("")) {
            return Err(ClientError::Config(
                "data source must not be empty".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ClientError::Config(
                "connect timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
