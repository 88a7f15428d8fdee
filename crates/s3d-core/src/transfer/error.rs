use std::path::PathBuf;

use thiserror::Error;

use crate::segmenter::{ByteRange, PartitionError};
use crate::store::StoreError;

/// Failure of a managed upload or download.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("I/O on {}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A range or part delivered fewer (or more) bytes than requested.
    #[error("range {range}: expected {expected} bytes, received {received}")]
    PartialTransfer {
        range: ByteRange,
        expected: u64,
        received: u64,
    },

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error("transfer aborted")]
    Aborted,

    #[error("transfer worker panicked")]
    WorkerPanicked,

    /// Part file creation, write or rename failed.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl TransferError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransferError::Io {
            path: path.into(),
            source,
        }
    }
}
