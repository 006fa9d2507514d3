//! End-to-end tests for the distributed sort
//!
//! Each test runs real nodes over loopback TCP. Where a peer needs to
//! misbehave, a hand-driven socket stands in for it.

mod common;

use common::*;
use meshsort_common::{KEY_LEN, VALUE_LEN};
use meshsort_core::shuffle::{FRAME_LEN, encode_data, encode_end, is_sorted};
use meshsort_core::{
    ClusterTopology, NodeDescriptor, Partitioner, PrefixPartitioner, ReceivePolicy, Record,
    ShuffleNode, SortError,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tracing::info;

const TEST_TIMEOUT: Duration = Duration::from_secs(30);

struct NodeFiles {
    input: PathBuf,
    output: PathBuf,
}

fn node_files(dir: &std::path::Path, id: usize) -> NodeFiles {
    NodeFiles {
        input: dir.join(format!("input-{}.dat", id)),
        output: dir.join(format!("output-{}.dat", id)),
    }
}

/// Run every node of `nodes` concurrently, node `i` starting after `delays[i]`.
async fn run_cluster(
    nodes: &[NodeDescriptor],
    inputs: &[Vec<Record>],
    delays: &[Duration],
    dir: &std::path::Path,
) -> Vec<Vec<Record>> {
    let mut handles = Vec::new();
    for id in 0..nodes.len() {
        let files = node_files(dir, id);
        write_records_file(&files.input, &inputs[id]);
        let node = ShuffleNode::new(topology_for(nodes, id), test_config());
        let delay = delays[id];
        handles.push(tokio::spawn(async move {
            sleep(delay).await;
            let result = node.run(&files.input, &files.output).await;
            result.map(|_| files.output)
        }));
    }

    let mut outputs = Vec::new();
    for handle in handles {
        let output = timeout(TEST_TIMEOUT, handle)
            .await
            .expect("node did not finish in time")
            .unwrap()
            .unwrap();
        outputs.push(read_records_file(&output));
    }
    outputs
}

fn check_partitioned_output(outputs: &[Vec<Record>], inputs: &[Vec<Record>]) {
    let partitioner = PrefixPartitioner::new(outputs.len()).unwrap();
    for (id, output) in outputs.iter().enumerate() {
        assert!(is_sorted(output), "node {} output is not sorted", id);
        for record in output {
            assert_eq!(
                partitioner.get_partition(record.key()),
                id,
                "node {} holds a record it does not own: {:?}",
                id,
                record
            );
        }
    }

    let all_output: Vec<Record> = outputs.iter().flatten().copied().collect();
    let all_input: Vec<Record> = inputs.iter().flatten().copied().collect();
    assert_same_records(all_output, all_input);
}

#[tokio::test]
async fn test_three_node_sort() {
    let _ = tracing_subscriber::fmt::try_init();
    let dir = tempfile::tempdir().unwrap();
    let nodes = loopback_nodes(3);
    let inputs: Vec<Vec<Record>> = (0..3).map(|id| generate_records(2_000, id as u64 + 1)).collect();

    let outputs = run_cluster(&nodes, &inputs, &[Duration::ZERO; 3], dir.path()).await;

    info!(
        "Output sizes: {:?}",
        outputs.iter().map(Vec::len).collect::<Vec<_>>()
    );
    check_partitioned_output(&outputs, &inputs);
}

#[tokio::test]
async fn test_staggered_start_with_empty_input() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = loopback_nodes(4);
    let inputs = vec![
        generate_records(500, 11),
        Vec::new(),
        generate_records(800, 13),
        generate_records(1, 14),
    ];
    let delays = [
        Duration::ZERO,
        Duration::from_millis(300),
        Duration::from_millis(50),
        Duration::from_millis(600),
    ];

    let outputs = run_cluster(&nodes, &inputs, &delays, dir.path()).await;

    check_partitioned_output(&outputs, &inputs);
}

#[tokio::test]
async fn test_single_node_from_topology_file() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = loopback_nodes(1);
    let topology_path = write_topology_yaml(dir.path(), &nodes);
    let files = node_files(dir.path(), 0);
    let input = generate_records(1_000, 7);
    write_records_file(&files.input, &input);

    let topology = ClusterTopology::load(&topology_path, 0).unwrap();
    let metrics = ShuffleNode::new(topology, test_config())
        .run(&files.input, &files.output)
        .await
        .unwrap();

    assert_eq!(metrics.sender.records_read, 1_000);
    assert_eq!(metrics.sender.records_local, 1_000);
    assert_eq!(metrics.sender.total_sent(), 0);
    assert_eq!(metrics.records_written, 1_000);

    let output = read_records_file(&files.output);
    assert!(is_sorted(&output));
    assert_same_records(output, input);
}

#[tokio::test]
async fn test_sorting_sorted_output_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = loopback_nodes(1);
    let files = node_files(dir.path(), 0);
    let mut input = generate_records(600, 3);
    // Duplicate keys with distinct values.
    let dup_key = *input[0].key();
    for i in 0..5u8 {
        input.push(Record::new(dup_key, [i; VALUE_LEN]));
    }
    write_records_file(&files.input, &input);

    let node = ShuffleNode::new(topology_for(&nodes, 0), test_config());
    node.run(&files.input, &files.output).await.unwrap();
    let first = std::fs::read(&files.output).unwrap();

    let again = dir.path().join("again.dat");
    node.run(&files.output, &again).await.unwrap();
    let second = std::fs::read(&again).unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_unknown_self_id_produces_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = loopback_nodes(3);
    let topology_path = write_topology_yaml(dir.path(), &nodes);

    let err = ClusterTopology::load(&topology_path, 3).unwrap_err();

    assert!(matches!(err, SortError::ConfigurationError { .. }));
    assert!(!node_files(dir.path(), 3).output.exists());
}

/// A stand-in for node 1 of a two-node cluster: drains whatever node 0 sends
/// it and writes `frames` to node 0.
async fn scripted_peer(peer: NodeDescriptor, target: NodeDescriptor, frames: Vec<u8>) -> Vec<u8> {
    let listener = TcpListener::bind(peer.address()).await.unwrap();
    let drain = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        stream.read_to_end(&mut received).await.unwrap();
        received
    });

    let mut stream = loop {
        match TcpStream::connect(target.address()).await {
            Ok(stream) => break stream,
            Err(_) => sleep(Duration::from_millis(20)).await,
        }
    };
    stream.write_all(&frames).await.unwrap();
    stream.shutdown().await.unwrap();

    drain.await.unwrap()
}

fn keyed(first_byte: u8, fill: u8) -> Record {
    let mut key = [fill; KEY_LEN];
    key[0] = first_byte;
    Record::new(key, [fill; VALUE_LEN])
}

#[tokio::test]
async fn test_peer_closing_before_end_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let nodes = loopback_nodes(2);
    let files = node_files(dir.path(), 0);
    write_records_file(&files.input, &generate_records(100, 5));

    let peer = tokio::spawn(scripted_peer(
        nodes[1].clone(),
        nodes[0].clone(),
        encode_data(&keyed(0x01, 1)).to_vec(),
    ));

    let node = ShuffleNode::new(topology_for(&nodes, 0), test_config());
    let err = timeout(TEST_TIMEOUT, node.run(&files.input, &files.output))
        .await
        .expect("node did not finish in time")
        .unwrap_err();

    assert!(matches!(err, SortError::FramingError { .. }), "{:?}", err);
    assert!(!files.output.exists());
    peer.abort();
}

async fn run_against_misrouting_peer(policy: ReceivePolicy) -> (Vec<Record>, Vec<u8>) {
    let dir = tempfile::tempdir().unwrap();
    let nodes = loopback_nodes(2);
    let files = node_files(dir.path(), 0);
    // Node 0 owns first bytes below 0x80.
    write_records_file(&files.input, &[keyed(0x20, 2), keyed(0xA0, 3)]);

    let mut frames = Vec::new();
    frames.extend_from_slice(&encode_data(&keyed(0x10, 4)));
    frames.extend_from_slice(&encode_data(&keyed(0xF0, 5)));
    frames.extend_from_slice(&encode_end());
    let peer = tokio::spawn(scripted_peer(nodes[1].clone(), nodes[0].clone(), frames));

    let config = test_config().with_receive_policy(policy);
    let metrics = timeout(
        TEST_TIMEOUT,
        ShuffleNode::new(topology_for(&nodes, 0), config).run(&files.input, &files.output),
    )
    .await
    .expect("node did not finish in time")
    .unwrap();
    assert_eq!(metrics.sender.total_sent(), 1);

    let sent_to_peer = peer.await.unwrap();
    (read_records_file(&files.output), sent_to_peer)
}

#[tokio::test]
async fn test_validate_policy_drops_misrouted_records() {
    let (output, sent_to_peer) = run_against_misrouting_peer(ReceivePolicy::Validate).await;

    assert_eq!(output, vec![keyed(0x10, 4), keyed(0x20, 2)]);

    // One DATA frame for the record node 1 owns, then END.
    assert_eq!(sent_to_peer.len(), 2 * FRAME_LEN);
    assert_eq!(&sent_to_peer[..FRAME_LEN], &encode_data(&keyed(0xA0, 3))[..]);
    assert_eq!(&sent_to_peer[FRAME_LEN..], &encode_end()[..]);
}

#[tokio::test]
async fn test_trust_policy_keeps_misrouted_records() {
    let (output, _) = run_against_misrouting_peer(ReceivePolicy::Trust).await;

    assert_eq!(
        output,
        vec![keyed(0x10, 4), keyed(0x20, 2), keyed(0xF0, 5)]
    );
}
