//! Chunked range-query fan-out.
//!
//! Fetches the object size, partitions `[0, size)` into ranges of at most
//! `chunk_bytes`, runs the query once per range and sums the records. A record
//! is counted by the range holding its first byte, so every partition of the
//! same object gives the same total in either mode.

mod counter;
mod error;
mod parallel;
mod range;
mod sequential;

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::config::DEFAULT_CHUNK_BYTES;
use crate::control::AbortToken;
use crate::segmenter::{self, ByteRange, PartitionError};
use crate::store::{ObjectStore, SelectQuery};
use crate::timing::Stopwatch;

pub use counter::RecordCounter;
pub use error::QueryError;

use range::RangeJob;

/// Default worker pool size for parallel runs.
pub const DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Sequential,
    Parallel,
}

/// Sent after each completed range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryProgress {
    pub range: ByteRange,
    pub range_records: u64,
    pub completed_ranges: usize,
    pub range_count: usize,
    /// Records counted so far by the run.
    pub total_records: u64,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub bucket: String,
    pub key: String,
    pub object_size: u64,
    pub chunk_bytes: u64,
    pub range_count: usize,
    pub total_records: u64,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub mode: RunMode,
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Counts the records a query returns over an object, one range at a time
/// or with a bounded pool of workers.
pub struct RangeQueryRunner {
    job: Arc<RangeJob>,
    chunk_bytes: u64,
    workers: usize,
    progress: Option<tokio::sync::mpsc::Sender<QueryProgress>>,
    abort: Option<AbortToken>,
}

impl RangeQueryRunner {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        query: SelectQuery,
    ) -> Self {
        Self {
            job: Arc::new(RangeJob {
                store,
                bucket: bucket.into(),
                key: key.into(),
                query,
            }),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            workers: DEFAULT_WORKERS,
            progress: None,
            abort: None,
        }
    }

    pub fn chunk_bytes(mut self, chunk_bytes: u64) -> Self {
        self.chunk_bytes = chunk_bytes;
        self
    }

    /// Upper bound on concurrent range queries in parallel mode.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// One event per completed range. A full sink pauses the run until the
    /// consumer catches up, so `run` must be called off the async workers
    /// (e.g. from `spawn_blocking`).
    pub fn progress(mut self, tx: tokio::sync::mpsc::Sender<QueryProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn abort_token(mut self, token: AbortToken) -> Self {
        self.abort = Some(token);
        self
    }

    pub fn run(&self, mode: RunMode) -> Result<RunSummary, QueryError> {
        // Reject a bad chunk size before talking to the store.
        if self.chunk_bytes == 0 {
            return Err(PartitionError::InvalidArgument { chunk_size: 0 }.into());
        }
        let job = &self.job;
        let sw = Stopwatch::start();
        let object_size = job
            .store
            .object_size(&job.bucket, &job.key)
            .map_err(|source| QueryError::ObjectSize {
                bucket: job.bucket.clone(),
                key: job.key.clone(),
                source,
            })?;
        let partition = segmenter::partition(object_size, self.chunk_bytes)?;
        tracing::info!(
            bucket = %job.bucket,
            key = %job.key,
            object_size,
            chunk_bytes = self.chunk_bytes,
            ranges = partition.len(),
            ?mode,
            "running range queries"
        );

        let total_records = match mode {
            RunMode::Sequential => sequential::run_sequential(
                job,
                &partition,
                self.progress.as_ref(),
                self.abort.as_ref(),
            )?,
            RunMode::Parallel => parallel::run_parallel(
                Arc::clone(job),
                &partition,
                self.workers,
                self.progress.as_ref(),
                self.abort.as_ref(),
            )?,
        };

        let summary = RunSummary {
            bucket: job.bucket.clone(),
            key: job.key.clone(),
            object_size,
            chunk_bytes: self.chunk_bytes,
            range_count: partition.len(),
            total_records,
            elapsed: sw.elapsed(),
            mode,
        };
        tracing::info!(total_records, elapsed_ms = summary.elapsed.as_millis() as u64, "range queries done");
        Ok(summary)
    }

    pub fn run_sequential(&self) -> Result<RunSummary, QueryError> {
        self.run(RunMode::Sequential)
    }

    pub fn run_parallel(&self) -> Result<RunSummary, QueryError> {
        self.run(RunMode::Parallel)
    }
}
