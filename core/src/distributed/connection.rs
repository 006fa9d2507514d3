//! Full-mesh connection lifecycle.
//!
//! Every node listens for its N-1 inbound peers and dials its N-1 outbound
//! peers. Connections carry no handshake; an accepted socket is handed to a
//! receiver straight away.

use crate::shuffle::{ReceiverMetrics, ShuffleContext};
use futures::future::try_join_all;
use meshsort_common::{
    ClusterTopology, ErrorContext, NodeDescriptor, NodeId, Result, ShuffleConfig, SortError,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{Instrument, debug, info, info_span};

/// Opens the inbound acceptor and dials outbound peers with retry.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    retry_interval: Duration,
    max_attempts: Option<u32>,
}

impl ConnectionManager {
    pub fn new(config: &ShuffleConfig) -> Self {
        Self {
            retry_interval: config.dial_retry_interval,
            max_attempts: config.dial_max_attempts,
        }
    }

    /// Bind the acceptor on this node's own address.
    pub async fn start_listening(&self, node: &NodeDescriptor) -> Result<TcpListener> {
        let address = node.address();
        let listener = TcpListener::bind(&address)
            .await
            .with_connection_context(|| format!("node {} could not listen on {}", node.id, address))?;
        info!("Node {} listening on {}", node.id, address);
        Ok(listener)
    }

    /// Dial one peer, retrying at a fixed interval until it accepts.
    ///
    /// Failed attempts surface as an error only when a maximum attempt count
    /// is configured.
    pub async fn dial(&self, node: &NodeDescriptor) -> Result<TcpStream> {
        let address = node.address();
        let mut attempts: u32 = 0;
        loop {
            match TcpStream::connect(&address).await {
                Ok(stream) => {
                    stream.set_nodelay(true).with_connection_context(|| {
                        format!("could not configure connection to {}", address)
                    })?;
                    debug!(
                        "Connected to node {} at {} after {} failed attempts",
                        node.id, address, attempts
                    );
                    return Ok(stream);
                }
                Err(e) => {
                    attempts += 1;
                    if self.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(SortError::connection_error_with_source(
                            format!(
                                "node {} at {} unreachable after {} attempts",
                                node.id, address, attempts
                            ),
                            e,
                        ));
                    }
                    debug!("Dial to node {} at {} failed: {}; retrying", node.id, address, e);
                    sleep(self.retry_interval).await;
                }
            }
        }
    }

    /// Dial every peer of `topology`; resolves once all of them are connected.
    pub async fn connect_all(&self, topology: &ClusterTopology) -> Result<BTreeMap<NodeId, TcpStream>> {
        let dials = topology
            .peers()
            .map(|peer| async move { self.dial(peer).await.map(|stream| (peer.id, stream)) });
        let connected: BTreeMap<NodeId, TcpStream> = try_join_all(dials).await?.into_iter().collect();
        info!(
            "Node {} connected to all {} peers",
            topology.self_id(),
            connected.len()
        );
        Ok(connected)
    }
}

/// Admit exactly `expected` inbound connections, run one receiver per
/// connection, and join them all.
///
/// The first receiver failure aborts the remaining receivers and is returned.
pub async fn serve_inbound(
    listener: TcpListener,
    expected: usize,
    context: ShuffleContext,
) -> Result<Vec<ReceiverMetrics>> {
    let mut receivers = JoinSet::new();
    let mut finished = Vec::with_capacity(expected);
    let mut accepted = 0;

    loop {
        tokio::select! {
            incoming = listener.accept(), if accepted < expected => {
                let (stream, remote) = incoming
                    .with_connection_context(|| "could not accept connection".to_string())?;
                accepted += 1;
                info!("Accepted connection from {} ({}/{})", remote, accepted, expected);
                let span = info_span!("receiver", peer = %remote);
                receivers.spawn(context.receiver().run(remote.to_string(), stream).instrument(span));
            }
            Some(joined) = receivers.join_next() => {
                let metrics = joined
                    .map_err(|e| SortError::internal_error_with_source("receiver task failed", e))??;
                finished.push(metrics);
            }
            else => break,
        }
    }

    debug!("All {} inbound streams complete", finished.len());
    Ok(finished)
}
