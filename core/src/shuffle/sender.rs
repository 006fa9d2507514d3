//! Streams the local input and routes every record to its owner.

use crate::io::RecordReader;
use crate::shuffle::codec::{Frame, FrameCodec};
use crate::shuffle::metrics::SenderMetrics;
use crate::shuffle::partitioner::Partitioner;
use crate::shuffle::sink::{RecordSink, SinkBuffer};
use futures::SinkExt;
use meshsort_common::{NodeId, Result, SortError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::FramedWrite;
use tracing::{debug, info};

/// Single-pass router from the local input to the sink and the peers.
///
/// Records owned by this node go straight to the sink. Everything else is
/// framed onto the outbound connection of its owner; write order is
/// preserved per connection. Once the input is exhausted every outbound
/// connection gets one END frame and is shut down.
#[derive(Debug)]
pub struct ShuffleSender {
    self_id: NodeId,
    partitioner: Arc<dyn Partitioner>,
    sink: Arc<RecordSink>,
    batch_size: usize,
}

impl ShuffleSender {
    pub fn new(
        self_id: NodeId,
        partitioner: Arc<dyn Partitioner>,
        sink: Arc<RecordSink>,
        batch_size: usize,
    ) -> Self {
        Self {
            self_id,
            partitioner,
            sink,
            batch_size,
        }
    }

    /// Route all of `input`. `outbound` must hold one writer per peer.
    pub async fn run<R, W>(self, input: R, outbound: BTreeMap<NodeId, W>) -> Result<SenderMetrics>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut links: BTreeMap<NodeId, FramedWrite<W, FrameCodec>> = outbound
            .into_iter()
            .map(|(id, writer)| (id, FramedWrite::new(writer, FrameCodec)))
            .collect();

        let mut metrics = SenderMetrics::default();
        for id in links.keys() {
            metrics.records_sent.insert(*id, 0);
        }

        let mut reader = RecordReader::new(input);
        let mut local = SinkBuffer::new(self.sink.clone(), self.batch_size);

        while let Some(record) = reader.next_record().await? {
            let destination = self.partitioner.get_partition(record.key());
            if destination == self.self_id {
                local.push(record)?;
                continue;
            }

            let link = links.get_mut(&destination).ok_or_else(|| {
                SortError::internal_error(format!(
                    "no outbound connection to node {}",
                    destination
                ))
            })?;
            link.feed(Frame::Data(record))
                .await
                .map_err(|e| write_failure(destination, e))?;
            *metrics.records_sent.entry(destination).or_default() += 1;
        }

        metrics.records_read = reader.records_read();
        metrics.records_local = local.finish()?;

        for (id, link) in links.iter_mut() {
            link.send(Frame::End)
                .await
                .map_err(|e| write_failure(*id, e))?;
            link.close().await.map_err(|e| write_failure(*id, e))?;
            debug!("Sent END to node {}", id);
        }

        info!(
            "Input exhausted: {} records read, {} kept locally, {} sent to {} peers",
            metrics.records_read,
            metrics.records_local,
            metrics.total_sent(),
            links.len()
        );
        Ok(metrics)
    }
}

fn write_failure(destination: NodeId, err: SortError) -> SortError {
    SortError::connection_error_with_source(
        format!("write to node {} failed", destination),
        err,
    )
}
