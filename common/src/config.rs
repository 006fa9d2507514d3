//! Tuning knobs for a shuffle run.

use crate::error::{Result, SortError};
use std::time::Duration;

/// How a receiver treats DATA frames whose key does not belong to this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReceivePolicy {
    /// Recompute the partition of every received key and drop mismatches.
    #[default]
    Validate,
    /// Accept every DATA frame the sender routed here.
    Trust,
}

/// Configuration for one node's shuffle run.
#[derive(Debug, Clone)]
pub struct ShuffleConfig {
    /// Delay between failed dial attempts
    pub dial_retry_interval: Duration,
    /// Give up dialing a peer after this many failed attempts; `None` retries forever
    pub dial_max_attempts: Option<u32>,
    /// Receiver-side partition check
    pub receive_policy: ReceivePolicy,
    /// Records a producer buffers before taking the sink lock
    pub sink_batch_size: usize,
    /// Capacity of buffered file readers and writers in bytes
    pub io_buffer_size: usize,
}

impl Default for ShuffleConfig {
    fn default() -> Self {
        Self {
            dial_retry_interval: Duration::from_millis(250),
            dial_max_attempts: None,
            receive_policy: ReceivePolicy::Validate,
            sink_batch_size: 1024,
            io_buffer_size: 64 * 1024,
        }
    }
}

impl ShuffleConfig {
    pub fn with_dial_retry_interval(mut self, interval: Duration) -> Self {
        self.dial_retry_interval = interval;
        self
    }

    pub fn with_dial_max_attempts(mut self, attempts: Option<u32>) -> Self {
        self.dial_max_attempts = attempts;
        self
    }

    pub fn with_receive_policy(mut self, policy: ReceivePolicy) -> Self {
        self.receive_policy = policy;
        self
    }

    pub fn with_sink_batch_size(mut self, batch_size: usize) -> Self {
        self.sink_batch_size = batch_size;
        self
    }

    pub fn with_io_buffer_size(mut self, buffer_size: usize) -> Self {
        self.io_buffer_size = buffer_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sink_batch_size == 0 {
            return Err(SortError::configuration_error(
                "sink batch size must be positive",
            ));
        }
        if self.io_buffer_size == 0 {
            return Err(SortError::configuration_error(
                "io buffer size must be positive",
            ));
        }
        if self.dial_max_attempts == Some(0) {
            return Err(SortError::configuration_error(
                "dial max attempts must be positive when set",
            ));
        }
        Ok(())
    }
}
