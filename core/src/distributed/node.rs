//! One node's end-to-end run: shuffle, barrier, sort, write.

use crate::distributed::connection::{ConnectionManager, serve_inbound};
use crate::io::PartialOutput;
use crate::shuffle::{ShuffleContext, ShuffleMetrics, sort_records_blocking, write_records};
use meshsort_common::{ClusterTopology, ErrorContext, Record, Result, ShuffleConfig, SortError};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tracing::{Instrument, info, info_span};

/// A cluster member ready to take part in one distributed sort.
#[derive(Debug, Clone)]
pub struct ShuffleNode {
    topology: ClusterTopology,
    config: ShuffleConfig,
}

impl ShuffleNode {
    pub fn new(topology: ClusterTopology, config: ShuffleConfig) -> Self {
        Self { topology, config }
    }

    pub fn topology(&self) -> &ClusterTopology {
        &self.topology
    }

    /// Sort this node's share of the global record set from `input` into `output`.
    ///
    /// `output` is only created after the shuffle has completed, and only
    /// becomes visible under its final name once fully written.
    pub async fn run<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output: Q) -> Result<ShuffleMetrics> {
        let started = Instant::now();
        let input = input.as_ref();
        let file = File::open(input)
            .await
            .with_io_context(|| format!("could not open input file {}", input.display()))?;
        let reader = BufReader::with_capacity(self.config.io_buffer_size, file);

        let (records, mut metrics) = self.shuffle_and_sort(reader).await?;

        let mut output = PartialOutput::create(output, self.config.io_buffer_size).await?;
        metrics.bytes_written = write_records(&records, output.writer()?).await?;
        let path = output.commit().await?;

        metrics.records_written = records.len() as u64;
        metrics.elapsed = started.elapsed();
        info!(
            "Node {} wrote {} records ({} bytes) to {} in {:?}",
            self.topology.self_id(),
            metrics.records_written,
            metrics.bytes_written,
            path.display(),
            metrics.elapsed
        );
        Ok(metrics)
    }

    /// Like [`ShuffleNode::run`], over arbitrary streams.
    pub async fn run_with_io<R, W>(&self, input: R, output: &mut W) -> Result<ShuffleMetrics>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let started = Instant::now();
        let (records, mut metrics) = self.shuffle_and_sort(input).await?;
        metrics.bytes_written = write_records(&records, output).await?;
        metrics.records_written = records.len() as u64;
        metrics.elapsed = started.elapsed();
        Ok(metrics)
    }

    /// Exchange records with every peer and return this node's records in key order.
    pub async fn shuffle_and_sort<R: AsyncRead + Unpin>(
        &self,
        input: R,
    ) -> Result<(Vec<Record>, ShuffleMetrics)> {
        let span = info_span!("node", id = self.topology.self_id());
        async move {
            let (records, metrics) = self.shuffle(input).await?;
            let sorted = sort_records_blocking(records).await?;
            info!("Sorted {} records", sorted.len());
            Ok((sorted, metrics))
        }
        .instrument(span)
        .await
    }

    async fn shuffle<R: AsyncRead + Unpin>(&self, input: R) -> Result<(Vec<Record>, ShuffleMetrics)> {
        let context = ShuffleContext::new(&self.topology, self.config.clone())?;
        let peers = self.topology.peer_count();
        let manager = ConnectionManager::new(&self.config);

        let listener = if peers > 0 {
            Some(manager.start_listening(self.topology.self_node()).await?)
        } else {
            None
        };

        let inbound = {
            let context = context.clone();
            async move {
                match listener {
                    Some(listener) => serve_inbound(listener, peers, context).await,
                    None => Ok(Vec::new()),
                }
            }
        };

        let outbound = async {
            let connections = if peers > 0 {
                manager.connect_all(&self.topology).await?
            } else {
                BTreeMap::new()
            };
            let sent = context.sender().run(input, connections).await?;
            context.barrier().wait().await;
            info!("Barrier released: every peer has delivered END");
            Ok::<_, SortError>(sent)
        };

        let (sender, receivers) = tokio::try_join!(outbound, inbound)?;
        let records = context.into_records()?;

        let metrics = ShuffleMetrics {
            sender,
            receivers,
            ..Default::default()
        };
        info!(
            "Shuffle complete: {} local, {} received, {} dropped",
            metrics.sender.records_local,
            metrics.records_received(),
            metrics.records_dropped()
        );
        Ok((records, metrics))
    }
}
