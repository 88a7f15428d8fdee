//! Managed transfers between local files and the object store.
//!
//! Uploads go out as a single PUT below the multipart threshold and as
//! parallel parts above it; a failed multipart upload is aborted so the store
//! drops the staged parts. Downloads fetch `part_size` ranges in parallel into
//! a preallocated `.part` file that is renamed into place on success.
//! Progress is reported as byte counts on a single-consumer channel.

mod download;
mod error;
mod pool;
mod progress;
mod upload;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::config::S3dConfig;
use crate::control::AbortToken;
use crate::store::ObjectStore;
use crate::timing::Stopwatch;

pub use error::TransferError;
pub use progress::TransferProgress;
pub use upload::MAX_PARTS;

/// Final state of a transfer, as printed after it finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferState {
    Completed,
    Failed,
    Canceled,
}

impl TransferState {
    pub fn of<T>(result: &Result<T, TransferError>) -> Self {
        match result {
            Ok(_) => TransferState::Completed,
            Err(TransferError::Aborted) => TransferState::Canceled,
            Err(_) => TransferState::Failed,
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferState::Completed => "Completed",
            TransferState::Failed => "Failed",
            TransferState::Canceled => "Canceled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Bytes per multipart part and per download range.
    pub part_size: u64,
    /// Uploads at least this large use multipart.
    pub multipart_threshold: u64,
    pub workers: usize,
    /// Use multipart regardless of size.
    pub force_multipart: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::from(&S3dConfig::default())
    }
}

impl From<&S3dConfig> for TransferOptions {
    fn from(cfg: &S3dConfig) -> Self {
        Self {
            part_size: cfg.part_size,
            multipart_threshold: cfg.multipart_threshold,
            workers: cfg.max_concurrent.max(1),
            force_multipart: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub bucket: String,
    pub key: String,
    pub bytes: u64,
    /// Parts uploaded, or ranges downloaded.
    pub parts: usize,
    pub multipart: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub state: TransferState,
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

pub struct TransferManager {
    store: Arc<dyn ObjectStore>,
    options: TransferOptions,
    progress: Option<tokio::sync::mpsc::Sender<TransferProgress>>,
    abort: Option<AbortToken>,
}

impl TransferManager {
    pub fn new(store: Arc<dyn ObjectStore>, options: TransferOptions) -> Self {
        Self {
            store,
            options,
            progress: None,
            abort: None,
        }
    }

    pub fn progress(mut self, tx: tokio::sync::mpsc::Sender<TransferProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn abort_token(mut self, token: AbortToken) -> Self {
        self.abort = Some(token);
        self
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    fn summary(
        &self,
        bucket: &str,
        key: &str,
        bytes: u64,
        parts: usize,
        multipart: bool,
        sw: Stopwatch,
    ) -> TransferSummary {
        TransferSummary {
            bucket: bucket.to_string(),
            key: key.to_string(),
            bytes,
            parts,
            multipart,
            elapsed: sw.elapsed(),
            state: TransferState::Completed,
        }
    }
}
