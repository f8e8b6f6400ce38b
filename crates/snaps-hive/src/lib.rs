//! Read-only Hive JSON-RPC access.
//!
//! Signing and broadcasting go through the external Hive client library;
//! this crate only reads posts and accounts, falling over between public
//! full nodes.

pub mod error;
pub mod rpc;

pub use error::HiveError;
pub use rpc::{DEFAULT_NODES, HiveClient};
