//! Range math and object partitioning.
//!
//! Splits an object of known size into ordered, contiguous, half-open byte
//! ranges no larger than a chunk size, and converts a range to the inclusive
//! form used on the wire (HTTP `Range`, S3 Select `ScanRange`).

mod partition;
mod range;

pub use partition::{partition, ranges, Partition, PartitionError, Ranges};
pub use range::ByteRange;

#[cfg(test)]
mod proptests;
