//! Single-request and multipart upload of a local file.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::pool::run_pool;
use super::progress::{ProgressReader, ProgressTracker};
use super::{TransferError, TransferManager, TransferSummary};
use crate::segmenter::{self, ByteRange};
use crate::store::CompletedPart;
use crate::timing::Stopwatch;

/// Most parts a multipart upload may have.
pub const MAX_PARTS: u64 = 10_000;

impl TransferManager {
    /// Uploads `path` to `bucket/key`: one PUT below the multipart threshold,
    /// otherwise parts of `part_size` bytes uploaded by the worker pool.
    pub fn upload_file(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
    ) -> Result<TransferSummary, TransferError> {
        let sw = Stopwatch::start();
        let size = std::fs::metadata(path)
            .map_err(|e| TransferError::io(path, e))?
            .len();
        let multipart = self.options.force_multipart || size >= self.options.multipart_threshold;
        let tracker = ProgressTracker::new(size, self.progress.clone());
        tracing::info!(bucket, key, size, multipart, src = %path.display(), "upload started");

        let parts = if multipart {
            self.upload_multipart(path, bucket, key, size, &tracker)?
        } else {
            let file = File::open(path).map_err(|e| TransferError::io(path, e))?;
            let mut reader = ProgressReader::new(file, &tracker);
            self.store.put_object(bucket, key, &mut reader, size)?;
            1
        };

        let summary = self.summary(bucket, key, tracker.finish(), parts, multipart, sw);
        tracing::info!(bucket, key, bytes = summary.bytes, parts, "upload completed");
        Ok(summary)
    }

    fn upload_multipart(
        &self,
        path: &Path,
        bucket: &str,
        key: &str,
        size: u64,
        tracker: &ProgressTracker,
    ) -> Result<usize, TransferError> {
        let part_size = effective_part_size(size, self.options.part_size);
        let ranges = segmenter::partition(size, part_size)?.into_vec();
        let upload_id = self.store.create_multipart_upload(bucket, key)?;

        let numbered: Vec<(u32, ByteRange)> = ranges
            .into_iter()
            .enumerate()
            .map(|(i, r)| (i as u32 + 1, r))
            .collect();
        let result = run_pool(numbered, self.options.workers, self.abort.as_ref(), |(n, range)| {
            let data = read_part(path, range)?;
            let part = self.store.upload_part(bucket, key, &upload_id, n, &data)?;
            tracker.add(range.len());
            tracing::trace!(part = n, %range, "part uploaded");
            Ok(part)
        })
        .and_then(|mut parts: Vec<CompletedPart>| {
            if parts.is_empty() {
                // An empty file still needs one (empty) part.
                parts.push(self.store.upload_part(bucket, key, &upload_id, 1, &[])?);
            }
            parts.sort_by_key(|p| p.part_number);
            self.store
                .complete_multipart_upload(bucket, key, &upload_id, &parts)?;
            Ok(parts.len())
        });

        match result {
            Ok(n) => Ok(n),
            Err(e) => {
                tracing::warn!(bucket, key, upload_id = %upload_id, "multipart upload failed: {}", e);
                if let Err(abort_err) = self.store.abort_multipart_upload(bucket, key, &upload_id) {
                    tracing::warn!(upload_id = %upload_id, "could not abort multipart upload: {}", abort_err);
                }
                Err(e)
            }
        }
    }
}

/// Grows `part_size` so the upload stays within [`MAX_PARTS`].
pub(crate) fn effective_part_size(size: u64, part_size: u64) -> u64 {
    part_size.max(size.div_ceil(MAX_PARTS)).max(1)
}

fn read_part(path: &Path, range: ByteRange) -> Result<Vec<u8>, TransferError> {
    let mut file = File::open(path).map_err(|e| TransferError::io(path, e))?;
    file.seek(SeekFrom::Start(range.start))
        .map_err(|e| TransferError::io(path, e))?;
    let mut data = Vec::with_capacity(range.len() as usize);
    file.take(range.len())
        .read_to_end(&mut data)
        .map_err(|e| TransferError::io(path, e))?;
    if data.len() as u64 != range.len() {
        return Err(TransferError::PartialTransfer {
            range,
            expected: range.len(),
            received: data.len() as u64,
        });
    }
    Ok(data)
}
