//! Object store client abstraction.
//!
//! The demos never talk to a store directly; they go through [`ObjectStore`],
//! a blocking trait implemented by an S3-compatible HTTP client and by a
//! local-directory store. Bodies are returned as streaming readers so callers
//! consume one range at a time and release it by dropping the reader.

mod error;
pub mod http;
pub mod local;
mod select;

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{Backend, S3dConfig};
use crate::retry::RetryPolicy;
use crate::segmenter::ByteRange;

pub use error::StoreError;
pub use http::HttpStore;
pub use local::LocalStore;
pub use select::{FileHeaderInfo, SelectQuery};

/// Streaming body of an object, a range of it, or a query result.
pub type ObjectBody = Box<dyn Read + Send>;

/// A part accepted by the store during a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u32,
    pub etag: String,
}

/// Read/write operations the demos need from an object store.
///
/// Implementations must be usable from several worker threads at once; each
/// returned body is owned exclusively by the caller.
pub trait ObjectStore: Send + Sync {
    /// Size of the object in bytes.
    fn object_size(&self, bucket: &str, key: &str) -> Result<u64, StoreError>;

    /// Whole-object byte stream.
    fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StoreError>;

    /// Byte stream of `range` only.
    fn get_range(&self, bucket: &str, key: &str, range: ByteRange)
        -> Result<ObjectBody, StoreError>;

    /// Runs `query` server-side over the records that start inside `range`.
    /// The stream yields newline-terminated output records.
    fn query_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
        query: &SelectQuery,
    ) -> Result<ObjectBody, StoreError>;

    /// Single-request upload of `len` bytes read from `body`.
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        len: u64,
    ) -> Result<(), StoreError>;

    /// Starts a multipart upload and returns its upload id.
    fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String, StoreError>;

    fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: &[u8],
    ) -> Result<CompletedPart, StoreError>;

    /// Assembles the object from `parts` (must be sorted by part number).
    fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StoreError>;

    fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StoreError>;
}

/// Builds the store selected by `cfg.backend`.
pub fn open(cfg: &S3dConfig) -> Result<Arc<dyn ObjectStore>> {
    match cfg.backend {
        Backend::Http => {
            let retry = RetryPolicy::from(&cfg.retry_or_default());
            let store = HttpStore::new(&cfg.endpoint, retry)
                .with_context(|| format!("invalid endpoint {}", cfg.endpoint))?
                .with_headers(cfg.headers.clone());
            tracing::debug!(endpoint = %cfg.endpoint, "using HTTP store");
            Ok(Arc::new(store))
        }
        Backend::Local => {
            let root = cfg
                .local_root
                .clone()
                .context("backend = \"local\" requires local_root")?;
            tracing::debug!(root = %root.display(), "using local store");
            Ok(Arc::new(LocalStore::new(root)))
        }
    }
}
