//! Final ordering and serialization of a node's records.

use meshsort_common::{ErrorContext, RECORD_LEN, Record, Result, SortError};
use rayon::prelude::*;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Stable sort by unsigned lexicographic key order.
///
/// Records with equal keys keep their arrival order.
pub fn sort_records(records: &mut [Record]) {
    records.par_sort_by(|a, b| a.cmp_key(b));
}

/// Sort on the blocking pool so a large record set does not stall the runtime.
pub async fn sort_records_blocking(mut records: Vec<Record>) -> Result<Vec<Record>> {
    tokio::task::spawn_blocking(move || {
        sort_records(&mut records);
        records
    })
    .await
    .map_err(|e| SortError::internal_error_with_source("sort task failed", e))
}

pub fn is_sorted(records: &[Record]) -> bool {
    records.windows(2).all(|pair| pair[0].cmp_key(&pair[1]).is_le())
}

/// Write every record as key followed by value, in slice order.
///
/// Returns the number of bytes written. The writer is flushed but not closed.
pub async fn write_records<W: AsyncWrite + Unpin>(records: &[Record], writer: &mut W) -> Result<u64> {
    for (index, record) in records.iter().enumerate() {
        writer
            .write_all(&record.to_bytes())
            .await
            .with_io_context(|| format!("failed to write output record {}", index))?;
    }
    writer
        .flush()
        .await
        .with_io_context(|| "failed to flush output".to_string())?;
    Ok((records.len() * RECORD_LEN) as u64)
}
