//! One range: open its scoped query, count the records, release the stream.

use std::sync::Arc;

use super::QueryError;
use crate::lines;
use crate::segmenter::ByteRange;
use crate::store::{ObjectStore, SelectQuery};

/// What every range of a run queries. Shared by the workers.
pub(crate) struct RangeJob {
    pub store: Arc<dyn ObjectStore>,
    pub bucket: String,
    pub key: String,
    pub query: SelectQuery,
}

impl RangeJob {
    pub(crate) fn count_range(&self, range: ByteRange) -> Result<u64, QueryError> {
        let body = self
            .store
            .query_range(&self.bucket, &self.key, range, &self.query)
            .map_err(|source| QueryError::RangeQueryFailure { range, source })?;
        // The stream is consumed and dropped here, before the next range opens.
        let records = lines::for_each_line(body, |n, record| {
            tracing::trace!(%range, n, record = %String::from_utf8_lossy(record), "record");
        })
        .map_err(|source| QueryError::StreamReadFailure { range, source })?;
        tracing::debug!(%range, records, "range done");
        Ok(records)
    }
}
