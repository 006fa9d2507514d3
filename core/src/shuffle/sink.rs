//! Node-local accumulation of records owned by this node.

use meshsort_common::{Record, Result, SortError};
use std::sync::{Arc, Mutex};

/// Records destined for this node, appended concurrently by every receiver
/// and by the sender's local route.
///
/// The sink is write-only while the shuffle runs. Its contents can only be
/// taken by [`RecordSink::into_records`], which needs sole ownership, so no
/// read can overlap an append.
#[derive(Debug, Default)]
pub struct RecordSink {
    records: Mutex<Vec<Record>>,
}

impl RecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: Record) -> Result<()> {
        self.lock()?.push(record);
        Ok(())
    }

    /// Move every record out of `batch` under a single lock acquisition.
    pub fn append_batch(&self, batch: &mut Vec<Record>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.lock()?.append(batch);
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Close the sink for writes and take its records.
    pub fn into_records(self) -> Result<Vec<Record>> {
        self.records
            .into_inner()
            .map_err(|_| SortError::internal_error("record sink lock poisoned"))
    }

    /// Unwrap a shared sink once every producer has dropped its handle.
    pub fn seal(sink: Arc<RecordSink>) -> Result<Vec<Record>> {
        match Arc::try_unwrap(sink) {
            Ok(sink) => sink.into_records(),
            Err(shared) => Err(SortError::internal_error(format!(
                "record sink still has {} producers after the barrier",
                Arc::strong_count(&shared) - 1
            ))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Record>>> {
        self.records
            .lock()
            .map_err(|_| SortError::internal_error("record sink lock poisoned"))
    }
}

/// Per-producer staging buffer in front of a shared [`RecordSink`].
#[derive(Debug)]
pub struct SinkBuffer {
    sink: Arc<RecordSink>,
    pending: Vec<Record>,
    batch_size: usize,
    appended: u64,
}

impl SinkBuffer {
    pub fn new(sink: Arc<RecordSink>, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            pending: Vec::with_capacity(batch_size),
            batch_size,
            appended: 0,
        }
    }

    pub fn push(&mut self, record: Record) -> Result<()> {
        self.pending.push(record);
        self.appended += 1;
        if self.pending.len() >= self.batch_size {
            self.sink.append_batch(&mut self.pending)?;
        }
        Ok(())
    }

    /// Hand any staged records to the sink and release the sink handle.
    pub fn finish(mut self) -> Result<u64> {
        self.sink.append_batch(&mut self.pending)?;
        Ok(self.appended)
    }
}
