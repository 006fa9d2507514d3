//! Counters reported by the shuffle stages.

use meshsort_common::NodeId;
use std::collections::BTreeMap;
use std::time::Duration;

/// What the sender did with the local input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderMetrics {
    pub records_read: u64,
    /// Records that stayed on this node without a network hop
    pub records_local: u64,
    /// Records written to each peer, by destination node id
    pub records_sent: BTreeMap<NodeId, u64>,
}

impl SenderMetrics {
    pub fn total_sent(&self) -> u64 {
        self.records_sent.values().sum()
    }
}

/// What one receiver took off its inbound connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiverMetrics {
    /// Remote socket address of the inbound connection
    pub peer: String,
    pub records_received: u64,
    /// DATA frames discarded because their key belongs to another node
    pub records_dropped: u64,
}

/// Summary of one node's complete run.
#[derive(Debug, Clone, Default)]
pub struct ShuffleMetrics {
    pub sender: SenderMetrics,
    pub receivers: Vec<ReceiverMetrics>,
    pub records_written: u64,
    pub bytes_written: u64,
    pub elapsed: Duration,
}

impl ShuffleMetrics {
    pub fn records_received(&self) -> u64 {
        self.receivers.iter().map(|r| r.records_received).sum()
    }

    pub fn records_dropped(&self) -> u64 {
        self.receivers.iter().map(|r| r.records_dropped).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals() {
        let mut sender = SenderMetrics::default();
        sender.records_sent.insert(1, 4);
        sender.records_sent.insert(2, 6);
        assert_eq!(sender.total_sent(), 10);

        let metrics = ShuffleMetrics {
            sender,
            receivers: vec![
                ReceiverMetrics {
                    peer: "127.0.0.1:1".to_string(),
                    records_received: 3,
                    records_dropped: 1,
                },
                ReceiverMetrics {
                    peer: "127.0.0.1:2".to_string(),
                    records_received: 5,
                    records_dropped: 0,
                },
            ],
            ..Default::default()
        };
        assert_eq!(metrics.records_received(), 8);
        assert_eq!(metrics.records_dropped(), 1);
    }
}
