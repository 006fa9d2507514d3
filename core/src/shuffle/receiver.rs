//! Drains one inbound connection into the local record sink.

use crate::shuffle::barrier::CompletionBarrier;
use crate::shuffle::codec::{Frame, FrameCodec};
use crate::shuffle::metrics::ReceiverMetrics;
use crate::shuffle::partitioner::Partitioner;
use crate::shuffle::sink::{RecordSink, SinkBuffer};
use futures::StreamExt;
use meshsort_common::{NodeId, ReceivePolicy, Result, SortError};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, warn};

/// Consumer for the frames of one peer.
///
/// DATA records are staged into the shared sink; under
/// [`ReceivePolicy::Validate`] records this node does not own are counted and
/// discarded. END stops the receiver and counts down the barrier. A stream
/// that ends before END, mid-frame or not, is a framing error.
#[derive(Debug)]
pub struct ShuffleReceiver {
    self_id: NodeId,
    partitioner: Arc<dyn Partitioner>,
    policy: ReceivePolicy,
    sink: Arc<RecordSink>,
    barrier: Arc<CompletionBarrier>,
    batch_size: usize,
}

impl ShuffleReceiver {
    pub fn new(
        self_id: NodeId,
        partitioner: Arc<dyn Partitioner>,
        policy: ReceivePolicy,
        sink: Arc<RecordSink>,
        barrier: Arc<CompletionBarrier>,
        batch_size: usize,
    ) -> Self {
        Self {
            self_id,
            partitioner,
            policy,
            sink,
            barrier,
            batch_size,
        }
    }

    pub async fn run<R: AsyncRead + Unpin>(self, peer: String, reader: R) -> Result<ReceiverMetrics> {
        let mut frames = FramedRead::new(reader, FrameCodec);
        let mut staged = SinkBuffer::new(self.sink.clone(), self.batch_size);
        let mut metrics = ReceiverMetrics {
            peer,
            ..Default::default()
        };

        loop {
            match frames.next().await {
                Some(Ok(Frame::Data(record))) => {
                    if self.policy == ReceivePolicy::Validate
                        && self.partitioner.get_partition(record.key()) != self.self_id
                    {
                        metrics.records_dropped += 1;
                        continue;
                    }
                    staged.push(record)?;
                    metrics.records_received += 1;
                }
                Some(Ok(Frame::End)) => break,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(SortError::framing_error(format!(
                        "{} closed the connection without END after {} records",
                        metrics.peer,
                        metrics.records_received + metrics.records_dropped
                    )));
                }
            }
        }

        staged.finish()?;
        drop(frames);
        let remaining = self.barrier.arrive()?;

        if metrics.records_dropped > 0 {
            warn!(
                "Dropped {} records from {} that belong to other nodes",
                metrics.records_dropped, metrics.peer
            );
        }
        debug!(
            "END from {} after {} records, {} peers outstanding",
            metrics.peer, metrics.records_received, remaining
        );
        Ok(metrics)
    }
}
