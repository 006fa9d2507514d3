//! Cluster topology: the ordered node list and this process's place in it.
//!
//! Topology files use the layout
//!
//! ```yaml
//! servers:
//!   - serverId: 0
//!     host: "localhost"
//!     port: "8080"
//! ```
//!
//! in YAML or the equivalent JSON. The list order defines node ids; each
//! entry's `serverId` must match its position.

use crate::error::{ErrorContext, Result, SortError};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Node identifier, equal to the node's position in the topology list.
pub type NodeId = usize;

/// Upper bound on cluster size: the partition function draws at most 8 bits
/// from the first key byte.
pub const MAX_NODES: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
}

impl NodeDescriptor {
    pub fn new<S: Into<String>>(id: NodeId, host: S, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// The immutable cluster description for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    nodes: Vec<NodeDescriptor>,
    self_id: NodeId,
}

#[derive(Debug, Deserialize)]
struct TopologyFile {
    servers: Vec<ServerEntry>,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    #[serde(rename = "serverId")]
    server_id: NodeId,
    host: String,
    port: PortValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

impl PortValue {
    fn resolve(&self, server_id: NodeId) -> Result<u16> {
        match self {
            PortValue::Number(port) => Ok(*port),
            PortValue::Text(text) => text.trim().parse::<u16>().with_configuration_context(|| {
                format!("server {} has invalid port '{}'", server_id, text)
            }),
        }
    }
}

/// Serialization format of a topology file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyFormat {
    Yaml,
    Json,
}

impl TopologyFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => TopologyFormat::Json,
            _ => TopologyFormat::Yaml,
        }
    }
}

impl ClusterTopology {
    /// Build a topology, checking ids, size bounds and the presence of `self_id`.
    pub fn new(nodes: Vec<NodeDescriptor>, self_id: NodeId) -> Result<Self> {
        if nodes.is_empty() {
            return Err(SortError::configuration_error(
                "topology must list at least one node",
            ));
        }
        if nodes.len() > MAX_NODES {
            return Err(SortError::configuration_error(format!(
                "topology lists {} nodes, at most {} are supported",
                nodes.len(),
                MAX_NODES
            )));
        }
        for (position, node) in nodes.iter().enumerate() {
            if node.id != position {
                return Err(SortError::configuration_error(format!(
                    "node at position {} declares id {}; ids must match list order",
                    position, node.id
                )));
            }
            if node.host.trim().is_empty() {
                return Err(SortError::configuration_error(format!(
                    "node {} has an empty host",
                    node.id
                )));
            }
        }
        if self_id >= nodes.len() {
            return Err(SortError::configuration_error(format!(
                "self id {} has no entry in a topology of {} nodes",
                self_id,
                nodes.len()
            )));
        }
        Ok(Self { nodes, self_id })
    }

    /// Read and validate a topology file.
    pub fn load<P: AsRef<Path>>(path: P, self_id: NodeId) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_configuration_context(|| {
            format!("could not read topology file {}", path.display())
        })?;
        debug!("Loaded topology file {}", path.display());
        Self::parse(&content, TopologyFormat::from_path(path), self_id)
    }

    pub fn parse(content: &str, format: TopologyFormat, self_id: NodeId) -> Result<Self> {
        let file: TopologyFile = match format {
            TopologyFormat::Yaml => serde_yaml::from_str(content)
                .with_configuration_context(|| "malformed YAML topology".to_string())?,
            TopologyFormat::Json => serde_json::from_str(content)
                .with_configuration_context(|| "malformed JSON topology".to_string())?,
        };

        let nodes = file
            .servers
            .iter()
            .map(|entry| {
                Ok(NodeDescriptor::new(
                    entry.server_id,
                    entry.host.clone(),
                    entry.port.resolve(entry.server_id)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(nodes, self_id)
    }

    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeDescriptor> {
        self.nodes.get(id)
    }

    pub fn self_node(&self) -> &NodeDescriptor {
        &self.nodes[self.self_id]
    }

    /// Every node except this one, in id order.
    pub fn peers(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.iter().filter(move |node| node.id != self.self_id)
    }

    pub fn peer_count(&self) -> usize {
        self.nodes.len() - 1
    }
}
