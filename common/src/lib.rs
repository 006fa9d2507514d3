//! Common types for the meshsort project.
//!
//! This crate holds the record model, cluster topology, run configuration and
//! the error taxonomy shared by every stage of the distributed sort.

pub mod config;
pub mod error;
pub mod record;
pub mod topology;

pub use config::{ReceivePolicy, ShuffleConfig};
pub use error::{Diagnose, ErrorCategory, ErrorContext, Result, SortError};
pub use record::{KEY_LEN, Key, RECORD_LEN, Record, VALUE_LEN, Value};
pub use topology::{ClusterTopology, MAX_NODES, NodeDescriptor, NodeId, TopologyFormat};
