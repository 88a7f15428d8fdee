//! Ranged parallel download into a preallocated part file.

use std::io::{self, Read};
use std::path::Path;

use super::pool::run_pool;
use super::progress::ProgressTracker;
use super::{TransferError, TransferManager, TransferSummary};
use crate::segmenter::{self, ByteRange};
use crate::storage::{self, PartFile, PartFileBuilder};
use crate::timing::Stopwatch;

const COPY_BUF: usize = 64 * 1024;

impl TransferManager {
    /// Downloads `bucket/key` to `dest` with `workers` concurrent ranged GETs
    /// of `part_size` bytes. `dest` only appears once every byte arrived.
    pub fn download_file(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
    ) -> Result<TransferSummary, TransferError> {
        let sw = Stopwatch::start();
        let size = self.store.object_size(bucket, key)?;
        let partition = segmenter::partition(size, self.options.part_size)?;
        let range_count = partition.len();
        tracing::info!(bucket, key, size, ranges = range_count, dest = %dest.display(), "download started");

        let part_path = storage::temp_path(dest);
        let mut builder = PartFileBuilder::create(&part_path)?;
        builder.preallocate(size)?;
        let file = builder.build();
        let tracker = ProgressTracker::new(size, self.progress.clone());

        let result = run_pool(
            partition.into_vec(),
            self.options.workers,
            self.abort.as_ref(),
            |range| self.download_range(bucket, key, range, &file, &tracker),
        );
        if let Err(e) = result {
            tracing::warn!(bucket, key, "download failed: {}", e);
            file.discard();
            return Err(e);
        }
        file.sync()?;
        file.finalize(dest)?;

        let summary = self.summary(bucket, key, tracker.finish(), range_count, range_count > 1, sw);
        tracing::info!(bucket, key, bytes = summary.bytes, "download completed");
        Ok(summary)
    }

    /// Downloads into a new temporary file that is deleted when the handle
    /// is dropped.
    pub fn download_to_temp(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<(tempfile::NamedTempFile, TransferSummary), TransferError> {
        let temp = tempfile::Builder::new()
            .prefix("s3d-")
            .suffix(".tmp")
            .tempfile()
            .map_err(|e| TransferError::io(std::env::temp_dir(), e))?;
        let summary = self.download_file(bucket, key, temp.path())?;
        Ok((temp, summary))
    }

    fn download_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
        file: &PartFile,
        tracker: &ProgressTracker,
    ) -> Result<(), TransferError> {
        let mut body = self.store.get_range(bucket, key, range)?;
        let mut buf = vec![0u8; COPY_BUF];
        let mut received = 0u64;
        loop {
            let n = match body.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransferError::io(file.path(), e)),
            };
            if received + n as u64 > range.len() {
                return Err(TransferError::PartialTransfer {
                    range,
                    expected: range.len(),
                    received: received + n as u64,
                });
            }
            file.write_at(range.start + received, &buf[..n])?;
            received += n as u64;
            tracker.add(n as u64);
        }
        if received != range.len() {
            return Err(TransferError::PartialTransfer {
                range,
                expected: range.len(),
                received,
            });
        }
        tracing::trace!(%range, "range downloaded");
        Ok(())
    }
}
