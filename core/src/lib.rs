//! Meshsort Core - distributed external sort over a full TCP mesh
//!
//! Each node streams its local records, routes every record to the node that
//! owns its key, receives the records other nodes route to it, and writes its
//! share of the global record set in key order.

pub mod distributed;
pub mod io;
pub mod shuffle;

pub use distributed::{ConnectionManager, ShuffleNode};
pub use meshsort_common::{
    ClusterTopology, NodeDescriptor, NodeId, ReceivePolicy, Record, Result, ShuffleConfig,
    SortError,
};
pub use shuffle::{
    CompletionBarrier, Frame, FrameCodec, Partitioner, PrefixPartitioner, RecordSink,
    ShuffleContext, ShuffleMetrics,
};
