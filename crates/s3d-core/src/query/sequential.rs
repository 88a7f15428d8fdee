use super::range::RangeJob;
use super::{QueryError, QueryProgress};
use crate::control::{self, AbortToken};
use crate::segmenter::Partition;

/// Ranges one after another; the first failure ends the run.
pub(super) fn run_sequential(
    job: &RangeJob,
    partition: &Partition,
    progress: Option<&tokio::sync::mpsc::Sender<QueryProgress>>,
    abort: Option<&AbortToken>,
) -> Result<u64, QueryError> {
    let range_count = partition.len();
    let mut total = 0u64;
    for (i, range) in partition.iter().enumerate() {
        if control::aborted(abort) {
            return Err(QueryError::Aborted {
                completed_ranges: i,
                range_count,
            });
        }
        let records = job.count_range(*range)?;
        total += records;
        if let Some(tx) = progress {
            let _ = tx.blocking_send(QueryProgress {
                range: *range,
                range_records: records,
                completed_ranges: i + 1,
                range_count,
                total_records: total,
            });
        }
    }
    Ok(total)
}
