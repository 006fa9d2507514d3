//! Defines the partitioner that routes records to nodes during a shuffle.

use meshsort_common::{Key, MAX_NODES, NodeId, Result, SortError};

/// Maps a record key to the node that owns it.
///
/// Sender routing and receiver-side validation must share one implementation
/// so that both ends agree on ownership.
pub trait Partitioner: Send + Sync + std::fmt::Debug {
    fn num_partitions(&self) -> usize;

    fn get_partition(&self, key: &Key) -> NodeId;
}

/// Range partitioner over the first key byte.
///
/// The destination is `(key[0] * n) >> 8`. When `n` is a power of two this is
/// exactly the `ceil(log2(n))` most significant bits of `key[0]`; for other
/// cluster sizes it folds the byte range evenly onto `[0, n)` instead of
/// producing ids past the last node. Node order follows key order, so node
/// outputs concatenated by id are globally sorted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixPartitioner {
    num_partitions: usize,
}

impl PrefixPartitioner {
    pub fn new(num_partitions: usize) -> Result<Self> {
        if num_partitions == 0 || num_partitions > MAX_NODES {
            return Err(SortError::configuration_error(format!(
                "partition count must be in 1..={}, got {}",
                MAX_NODES, num_partitions
            )));
        }
        Ok(Self { num_partitions })
    }

    /// Number of high-order key bits that select a node: `ceil(log2(n))`.
    pub fn prefix_bits(&self) -> u32 {
        if self.num_partitions <= 1 {
            0
        } else {
            usize::BITS - (self.num_partitions - 1).leading_zeros()
        }
    }
}

impl Partitioner for PrefixPartitioner {
    fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    fn get_partition(&self, key: &Key) -> NodeId {
        (key[0] as usize * self.num_partitions) >> 8
    }
}
