//! Bounded worker pool over the ranges of a partition.
//!
//! Workers pop ranges from a shared queue, count each range into the run's
//! [`RecordCounter`] and report the outcome on a channel. The total is read
//! only after every worker has been joined, and only if no range failed.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use super::range::RangeJob;
use super::{QueryError, QueryProgress, RecordCounter};
use crate::control::{self, AbortToken};
use crate::segmenter::{ByteRange, Partition};

pub(super) fn run_parallel(
    job: Arc<RangeJob>,
    partition: &Partition,
    workers: usize,
    progress: Option<&tokio::sync::mpsc::Sender<QueryProgress>>,
    abort: Option<&AbortToken>,
) -> Result<u64, QueryError> {
    let range_count = partition.len();
    if range_count == 0 {
        return Ok(0);
    }
    let work: Arc<Mutex<VecDeque<ByteRange>>> =
        Arc::new(Mutex::new(partition.iter().copied().collect()));
    let counter = RecordCounter::new();
    let (tx, rx) = mpsc::channel::<(ByteRange, Result<u64, QueryError>)>();
    let num_workers = workers.max(1).min(range_count);
    tracing::debug!(workers = num_workers, ranges = range_count, "starting range workers");

    let mut handles = Vec::with_capacity(num_workers);
    for i in 0..num_workers {
        let job = Arc::clone(&job);
        let work = Arc::clone(&work);
        let counter = counter.clone();
        let tx = tx.clone();
        let abort = abort.cloned();
        let spawned = thread::Builder::new()
            .name(format!("s3d-range-{}", i))
            .spawn(move || loop {
                if control::aborted(abort.as_ref()) {
                    break;
                }
                let next = work.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                let Some(range) = next else {
                    break;
                };
                let res = job.count_range(range);
                if let Ok(n) = &res {
                    counter.add(*n);
                }
                if tx.send((range, res)).is_err() {
                    break;
                }
            });
        match spawned {
            Ok(h) => handles.push(h),
            Err(e) => {
                // Fewer workers still drain the queue.
                tracing::warn!("could not spawn range worker {}: {}", i, e);
                if handles.is_empty() {
                    return Err(QueryError::WorkerSpawn(e));
                }
            }
        }
    }
    drop(tx);

    let mut failures = Vec::new();
    let mut completed = 0usize;
    for (range, res) in rx {
        match res {
            Ok(records) => {
                completed += 1;
                if let Some(p) = progress {
                    let _ = p.blocking_send(QueryProgress {
                        range,
                        range_records: records,
                        completed_ranges: completed,
                        range_count,
                        total_records: counter.get(),
                    });
                }
            }
            Err(e) => {
                tracing::warn!(%range, "range failed: {}", e);
                failures.push(e);
            }
        }
    }

    let mut panicked = false;
    for h in handles {
        panicked |= h.join().is_err();
    }
    if panicked {
        return Err(QueryError::WorkerPanicked);
    }
    if !failures.is_empty() {
        failures.sort_by_key(|e| e.range().map(|r| r.start));
        return Err(QueryError::RangesFailed {
            failures,
            range_count,
            completed_records: counter.get(),
        });
    }
    if completed < range_count {
        return Err(QueryError::Aborted {
            completed_ranges: completed,
            range_count,
        });
    }
    Ok(counter.get())
}
