//! Common test utilities and helpers for integration tests

use meshsort_core::{ClusterTopology, NodeDescriptor, Record, ShuffleConfig};
use meshsort_common::{KEY_LEN, RECORD_LEN, VALUE_LEN};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Ask the OS for a port that is free right now.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Loopback descriptors for an `n`-node cluster on fresh ports.
pub fn loopback_nodes(n: usize) -> Vec<NodeDescriptor> {
    (0..n)
        .map(|id| NodeDescriptor::new(id, "127.0.0.1", free_port()))
        .collect()
}

pub fn topology_for(nodes: &[NodeDescriptor], self_id: usize) -> ClusterTopology {
    ClusterTopology::new(nodes.to_vec(), self_id).unwrap()
}

/// Config tuned for tests: quick redials and small sink batches.
pub fn test_config() -> ShuffleConfig {
    ShuffleConfig::default()
        .with_dial_retry_interval(Duration::from_millis(20))
        .with_sink_batch_size(16)
}

/// Deterministic pseudo-random records; `seed` separates one node's input
/// from another's.
pub fn generate_records(count: usize, seed: u64) -> Vec<Record> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    (0..count)
        .map(|i| {
            let mut key = [0u8; KEY_LEN];
            for chunk in key.chunks_mut(8) {
                let bytes = next().to_be_bytes();
                chunk.copy_from_slice(&bytes[..chunk.len()]);
            }
            let mut value = [0u8; VALUE_LEN];
            value[..8].copy_from_slice(&seed.to_be_bytes());
            value[8..16].copy_from_slice(&(i as u64).to_be_bytes());
            Record::new(key, value)
        })
        .collect()
}

pub fn write_records_file(path: &Path, records: &[Record]) {
    let bytes: Vec<u8> = records.iter().flat_map(|r| r.to_bytes()).collect();
    std::fs::write(path, bytes).unwrap();
}

pub fn read_records_file(path: &Path) -> Vec<Record> {
    let bytes = std::fs::read(path).unwrap();
    assert_eq!(bytes.len() % RECORD_LEN, 0, "output is not whole records");
    bytes
        .chunks(RECORD_LEN)
        .map(|chunk| Record::try_from(chunk).unwrap())
        .collect()
}

/// Write `nodes` as a YAML topology file, ports quoted the way hand-written
/// files usually carry them.
#[allow(dead_code)] // Not every test binary loads topology from disk
pub fn write_topology_yaml(dir: &Path, nodes: &[NodeDescriptor]) -> PathBuf {
    let mut yaml = String::from("servers:\n");
    for node in nodes {
        yaml.push_str(&format!(
            "  - serverId: {}\n    host: \"{}\"\n    port: \"{}\"\n",
            node.id, node.host, node.port
        ));
    }
    let path = dir.join("cluster.yaml");
    std::fs::write(&path, yaml).unwrap();
    path
}

/// Assert that two record lists hold the same records, ignoring order.
pub fn assert_same_records(mut actual: Vec<Record>, mut expected: Vec<Record>) {
    actual.sort_by(|a, b| a.cmp_key(b).then_with(|| a.value().cmp(b.value())));
    expected.sort_by(|a, b| a.cmp_key(b).then_with(|| a.value().cmp(b.value())));
    assert_eq!(actual.len(), expected.len());
    assert_eq!(actual, expected);
}
