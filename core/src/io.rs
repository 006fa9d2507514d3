//! Record-level file I/O helpers.

use meshsort_common::{ErrorContext, RECORD_LEN, Record, Result, SortError};
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::debug;

/// Reads whole 100-byte records from a byte stream.
pub struct RecordReader<R> {
    inner: R,
    buffer: [u8; RECORD_LEN],
    records_read: u64,
}

impl<R: AsyncRead + Unpin> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buffer: [0u8; RECORD_LEN],
            records_read: 0,
        }
    }

    /// Next record, or `None` at a clean end of input.
    ///
    /// Input that ends inside a record is an error.
    pub async fn next_record(&mut self) -> Result<Option<Record>> {
        let index = self.records_read;
        let mut filled = 0;
        while filled < RECORD_LEN {
            let n = self
                .inner
                .read(&mut self.buffer[filled..])
                .await
                .with_io_context(|| format!("failed to read record {} from input", index))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(SortError::io_error(format!(
                    "input ends with a partial record of {} bytes after {} whole records",
                    filled, self.records_read
                )));
            }
            filled += n;
        }
        self.records_read += 1;
        Ok(Some(Record::from_array(&self.buffer)))
    }

    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

/// Output file that only appears at its final path once fully written.
///
/// Records are written to `<path>.partial`; [`PartialOutput::commit`] flushes,
/// syncs and renames it into place. Dropping without committing removes the
/// partial file on a best-effort basis, including after a failed commit.
pub struct PartialOutput {
    target: PathBuf,
    partial: PathBuf,
    writer: Option<BufWriter<File>>,
    committed: bool,
}

impl PartialOutput {
    pub async fn create<P: AsRef<Path>>(target: P, buffer_size: usize) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let partial = partial_path(&target);
        let file = File::create(&partial).await.with_io_context(|| {
            format!("could not create output file {}", partial.display())
        })?;
        debug!("Writing output to {}", partial.display());
        Ok(Self {
            target,
            partial,
            writer: Some(BufWriter::with_capacity(buffer_size, file)),
            committed: false,
        })
    }

    pub fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| SortError::internal_error("output already committed"))
    }

    pub async fn commit(mut self) -> Result<PathBuf> {
        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| SortError::internal_error("output already committed"))?;
        writer
            .flush()
            .await
            .with_io_context(|| format!("could not flush {}", self.partial.display()))?;
        let file = writer.into_inner();
        file.sync_all()
            .await
            .with_io_context(|| format!("could not sync {}", self.partial.display()))?;
        drop(file);
        fs::rename(&self.partial, &self.target)
            .await
            .with_io_context(|| {
                format!(
                    "could not move {} to {}",
                    self.partial.display(),
                    self.target.display()
                )
            })?;
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.partial);
        }
    }
}

pub fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}
