//! Core components for the record shuffle.

pub mod barrier;
pub mod codec;
pub mod context;
pub mod metrics;
pub mod partitioner;
pub mod receiver;
pub mod sender;
pub mod sink;
pub mod sorter;

pub use barrier::CompletionBarrier;
pub use codec::{Control, FRAME_LEN, Frame, FrameCodec, decode, encode_data, encode_end};
pub use context::ShuffleContext;
pub use metrics::{ReceiverMetrics, SenderMetrics, ShuffleMetrics};
pub use partitioner::{Partitioner, PrefixPartitioner};
pub use receiver::ShuffleReceiver;
pub use sender::ShuffleSender;
pub use sink::{RecordSink, SinkBuffer};
pub use sorter::{is_sorted, sort_records, sort_records_blocking, write_records};
