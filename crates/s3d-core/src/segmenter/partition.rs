//! Chunked partition planning.

use super::range::ByteRange;
use std::ops::Deref;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("invalid argument: chunk size must be positive, got {chunk_size}")]
    InvalidArgument { chunk_size: u64 },
}

/// Lazily yields the ranges of a partition in ascending order.
#[derive(Debug, Clone)]
pub struct Ranges {
    cursor: u64,
    total_size: u64,
    chunk_size: u64,
}

impl Iterator for Ranges {
    type Item = ByteRange;

    fn next(&mut self) -> Option<ByteRange> {
        if self.cursor >= self.total_size {
            return None;
        }
        let end = self
            .cursor
            .saturating_add(self.chunk_size)
            .min(self.total_size);
        let range = ByteRange::new(self.cursor, end);
        self.cursor = end;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total_size.saturating_sub(self.cursor);
        let n = remaining.div_ceil(self.chunk_size);
        let n = usize::try_from(n).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

/// Iterator form of [`partition`].
pub fn ranges(total_size: u64, chunk_size: u64) -> Result<Ranges, PartitionError> {
    if chunk_size == 0 {
        return Err(PartitionError::InvalidArgument { chunk_size });
    }
    Ok(Ranges {
        cursor: 0,
        total_size,
        chunk_size,
    })
}

/// Ordered, contiguous ranges covering `[0, total_size)` exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    ranges: Vec<ByteRange>,
    total_size: u64,
    chunk_size: u64,
}

impl Partition {
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn into_vec(self) -> Vec<ByteRange> {
        self.ranges
    }
}

impl Deref for Partition {
    type Target = [ByteRange];

    fn deref(&self) -> &[ByteRange] {
        &self.ranges
    }
}

impl<'a> IntoIterator for &'a Partition {
    type Item = &'a ByteRange;
    type IntoIter = std::slice::Iter<'a, ByteRange>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

/// Splits `[0, total_size)` into ranges of at most `chunk_size` bytes.
///
/// Every range is `chunk_size` long except possibly the last, which keeps the
/// remainder. Returns an empty partition when `total_size` is 0 and
/// `InvalidArgument` when `chunk_size` is 0.
pub fn partition(total_size: u64, chunk_size: u64) -> Result<Partition, PartitionError> {
    let ranges = ranges(total_size, chunk_size)?.collect();
    Ok(Partition {
        ranges,
        total_size,
        chunk_size,
    })
}
