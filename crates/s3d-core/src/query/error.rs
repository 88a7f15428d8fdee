//! Errors of a range query run.

use std::fmt::Write as _;

use thiserror::Error;

use crate::segmenter::{ByteRange, PartitionError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum QueryError {
    /// Chunk size rejected by the partitioner; no query was issued.
    #[error(transparent)]
    InvalidArgument(#[from] PartitionError),

    #[error("could not determine size of {bucket}/{key}")]
    ObjectSize {
        bucket: String,
        key: String,
        source: StoreError,
    },

    /// The store refused or failed the query scoped to `range`.
    #[error("query over range {range} failed")]
    RangeQueryFailure { range: ByteRange, source: StoreError },

    /// The record stream of `range` broke after it was opened.
    #[error("reading records of range {range} failed")]
    StreamReadFailure {
        range: ByteRange,
        source: std::io::Error,
    },

    /// Parallel run in which at least one range failed. `completed_records`
    /// is what the successful ranges produced and is not a result.
    #[error("{} of {range_count} ranges failed: {}", .failures.len(), describe(.failures))]
    RangesFailed {
        failures: Vec<QueryError>,
        range_count: usize,
        completed_records: u64,
    },

    #[error("range worker panicked")]
    WorkerPanicked,

    /// Not a single worker thread could be started.
    #[error("could not start range workers")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("aborted after {completed_ranges} of {range_count} ranges")]
    Aborted {
        completed_ranges: usize,
        range_count: usize,
    },
}

impl QueryError {
    /// The range a per-range failure belongs to.
    pub fn range(&self) -> Option<ByteRange> {
        match self {
            QueryError::RangeQueryFailure { range, .. }
            | QueryError::StreamReadFailure { range, .. } => Some(*range),
            _ => None,
        }
    }
}

/// First failure with its cause chain, plus how many more there are.
fn describe(failures: &[QueryError]) -> String {
    let Some(first) = failures.first() else {
        return String::new();
    };
    let mut out = first.to_string();
    let mut cause = std::error::Error::source(first);
    while let Some(c) = cause {
        let _ = write!(out, ": {}", c);
        cause = c.source();
    }
    if failures.len() > 1 {
        let _ = write!(out, " (and {} more)", failures.len() - 1);
    }
    out
}
