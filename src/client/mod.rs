//! Client connection layer and facade

#[cfg(test)]
pub(crate) mod memory_store;
pub mod namespace;
pub mod poll;
pub mod raw_connection;
pub mod store_client;
pub mod transport;

pub use namespace::{KeyClass, Namespace, KEY_SEPARATOR};
pub use poll::poll_until;
pub use raw_connection::{ConnectionFactory, RawConnection};
pub use store_client::Client;
pub use transport::{ConnectionPool, Transport};
