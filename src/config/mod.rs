//! Configuration module

pub mod cli;
pub mod client_config;

pub use cli::{CliArgs, Command, ConnectionArgs, KeyKind};
pub use client_config::{AuthConfig, ClientConfig, ServerAddress, ENV_DB_ADDRESS, ENV_KEY_OUT};
