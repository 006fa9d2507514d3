//! Cluster-facing side of a sort run: connection lifecycle and node driver.

pub mod connection;
pub mod node;

pub use connection::{ConnectionManager, serve_inbound};
pub use node::ShuffleNode;
