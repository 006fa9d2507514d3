//! Per-run shuffle state shared by the sender and every receiver.

use crate::shuffle::barrier::CompletionBarrier;
use crate::shuffle::partitioner::{Partitioner, PrefixPartitioner};
use crate::shuffle::receiver::ShuffleReceiver;
use crate::shuffle::sender::ShuffleSender;
use crate::shuffle::sink::RecordSink;
use meshsort_common::{ClusterTopology, NodeId, Record, Result, ShuffleConfig};
use std::sync::Arc;

/// Owns the record sink, the completion barrier and the partitioner of one
/// node's run, and hands out producers bound to them.
#[derive(Debug, Clone)]
pub struct ShuffleContext {
    self_id: NodeId,
    partitioner: Arc<dyn Partitioner>,
    config: ShuffleConfig,
    sink: Arc<RecordSink>,
    barrier: Arc<CompletionBarrier>,
}

impl ShuffleContext {
    pub fn new(topology: &ClusterTopology, config: ShuffleConfig) -> Result<Self> {
        config.validate()?;
        let partitioner = PrefixPartitioner::new(topology.node_count())?;
        Ok(Self {
            self_id: topology.self_id(),
            partitioner: Arc::new(partitioner),
            config,
            sink: Arc::new(RecordSink::new()),
            barrier: Arc::new(CompletionBarrier::new(topology.peer_count())),
        })
    }

    pub fn self_id(&self) -> NodeId {
        self.self_id
    }

    pub fn config(&self) -> &ShuffleConfig {
        &self.config
    }

    pub fn partitioner(&self) -> &Arc<dyn Partitioner> {
        &self.partitioner
    }

    pub fn barrier(&self) -> &Arc<CompletionBarrier> {
        &self.barrier
    }

    pub fn sender(&self) -> ShuffleSender {
        ShuffleSender::new(
            self.self_id,
            self.partitioner.clone(),
            self.sink.clone(),
            self.config.sink_batch_size,
        )
    }

    pub fn receiver(&self) -> ShuffleReceiver {
        ShuffleReceiver::new(
            self.self_id,
            self.partitioner.clone(),
            self.config.receive_policy,
            self.sink.clone(),
            self.barrier.clone(),
            self.config.sink_batch_size,
        )
    }

    /// Take the accumulated records. Every producer handed out by this
    /// context, and every clone of the context, must be dropped first.
    pub fn into_records(self) -> Result<Vec<Record>> {
        RecordSink::seal(self.sink)
    }
}
