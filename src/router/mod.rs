//! Key/command routing
//!
//! Turns typed operations into store commands and picks the node each
//! command is sent to.

pub mod command;
pub mod strategy;

pub use command::{Command, ModelOptions};
pub use strategy::{Router, RoutingStrategy};
