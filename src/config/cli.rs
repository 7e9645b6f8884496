//! Command-line argument parsing for the `silc` tool

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use super::client_config::{AuthConfig, ClientConfig, ServerAddress};
use crate::utils::Result;

/// Inspect and exchange tensors, datasets and models in a Redis-compatible store
#[derive(Parser, Debug, Clone)]
#[command(name = "silc")]
#[command(version, about, long_about = None)]
#[command(disable_help_flag = true)]
pub struct CliArgs {
    /// Print help information
    #[arg(long = "help", action = clap::ArgAction::Help)]
    help: (),

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// JSON configuration file (command-line flags override it)
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Server address host:port (can be specified multiple times for cluster)
    #[arg(short = 'h', long = "host", action = clap::ArgAction::Append)]
    pub hosts: Vec<String>,

    /// Enable cluster mode
    #[arg(long = "cluster")]
    pub cluster_mode: bool,

    /// Password for AUTH command
    #[arg(short = 'a', long = "auth")]
    pub password: Option<String>,

    /// Username for ACL AUTH (requires --auth)
    #[arg(long = "user")]
    pub username: Option<String>,

    /// Database number to SELECT
    #[arg(long = "dbnum")]
    pub dbnum: Option<u32>,

    /// Connection timeout in milliseconds
    #[arg(long = "connect-timeout", default_value_t = 5000)]
    pub connect_timeout_ms: u64,

    /// Ensemble member whose keys are read and written
    #[arg(long = "data-source")]
    pub data_source: Option<String>,

    /// Prefix tensor and dataset keys with the data source
    #[arg(long = "tensor-prefix")]
    pub tensor_prefix: bool,

    /// Prefix model and script keys with the data source
    #[arg(long = "model-prefix")]
    pub model_prefix: bool,
}

/// Which key class an existence check or poll addresses
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Raw key, never prefixed
    Key,
    Tensor,
    Dataset,
    Model,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check the connection
    Ping,

    /// Check whether a key exists
    Exists {
        key: String,
        #[arg(long = "kind", value_enum, default_value_t = KeyKind::Key)]
        kind: KeyKind,
    },

    /// Wait for a key to appear
    Poll {
        key: String,
        #[arg(long = "kind", value_enum, default_value_t = KeyKind::Key)]
        kind: KeyKind,
        /// Delay between checks in milliseconds
        #[arg(long = "interval", default_value_t = 100)]
        interval_ms: u64,
        /// Maximum number of checks
        #[arg(long = "tries", default_value_t = 10)]
        tries: i32,
    },

    /// Store a tensor from comma-separated values
    PutTensor {
        name: String,
        /// Element type (DOUBLE, FLOAT, INT64, INT32, INT16, INT8, UINT16, UINT8)
        #[arg(long = "type")]
        ttype: String,
        /// Dimensions, e.g. 10,5
        #[arg(long = "dims", value_delimiter = ',', required = true)]
        dims: Vec<usize>,
        /// Row-major values, e.g. 1,2,3
        #[arg(long = "values", value_delimiter = ',', allow_hyphen_values = true, required = true)]
        values: Vec<String>,
    },

    /// Print a tensor as JSON
    GetTensor { name: String },

    /// Delete a tensor
    DeleteTensor { name: String },

    /// Print a dataset summary as JSON
    GetDataset { name: String },

    /// Upload a model file
    SetModel {
        key: String,
        #[arg(long = "file")]
        file: PathBuf,
        /// Backend identifier (TF, TORCH, ONNX, ...)
        #[arg(long = "backend")]
        backend: String,
        #[arg(long = "device", default_value = "CPU")]
        device: String,
        #[arg(long = "batch-size", default_value_t = 0)]
        batch_size: u32,
        #[arg(long = "min-batch-size", default_value_t = 0)]
        min_batch_size: u32,
        #[arg(long = "tag", default_value = "")]
        tag: String,
        #[arg(long = "inputs", value_delimiter = ',')]
        inputs: Vec<String>,
        #[arg(long = "outputs", value_delimiter = ',')]
        outputs: Vec<String>,
    },

    /// Download a model blob, printing its size
    GetModel {
        key: String,
        /// Write the blob to this file
        #[arg(long = "out")]
        out: Option<PathBuf>,
    },

    /// Run a stored model
    RunModel {
        key: String,
        #[arg(long = "inputs", value_delimiter = ',', required = true)]
        inputs: Vec<String>,
        #[arg(long = "outputs", value_delimiter = ',', required = true)]
        outputs: Vec<String>,
    },

    /// Upload a script file
    SetScript {
        key: String,
        #[arg(long = "file")]
        file: PathBuf,
        #[arg(long = "device", default_value = "CPU")]
        device: String,
    },

    /// Print the source of a stored script
    GetScript { key: String },

    /// Run a function of a stored script
    RunScript {
        key: String,
        #[arg(long = "function")]
        function: String,
        #[arg(long = "inputs", value_delimiter = ',', required = true)]
        inputs: Vec<String>,
        #[arg(long = "outputs", value_delimiter = ',', required = true)]
        outputs: Vec<String>,
    },
}

impl CliArgs {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl ConnectionArgs {
    /// Resolve the client configuration: file or environment, then flags
    pub fn to_client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)?,
            None => ClientConfig::from_env()?,
        };

        if !self.hosts.is_empty() {
            config.addresses = self
                .hosts
                .iter()
                .map(|h| h.parse::<ServerAddress>())
                .collect::<Result<_>>()?;
        }
        if self.cluster_mode {
            config.cluster_mode = true;
        }
        if let Some(password) = &self.password {
            config.auth = Some(AuthConfig {
                password: password.clone(),
                username: self.username.clone(),
            });
        }
        if self.dbnum.is_some() {
            config.dbnum = self.dbnum;
        }
        config.connect_timeout_ms = self.connect_timeout_ms;
        if self.data_source.is_some() {
            config.data_source = self.data_source.clone();
        }
        config.use_tensor_prefix |= self.tensor_prefix;
        config.use_model_prefix |= self.model_prefix;

        config.validate()?;
        Ok(config)
    }
}
