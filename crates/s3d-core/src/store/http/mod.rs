//! S3-compatible HTTP store (path-style addressing) on top of libcurl.
//!
//! Every call builds a fresh `curl::easy::Easy`, so the store itself holds no
//! connection state and can be shared across worker threads. Request setup
//! failures and retryable statuses are retried with the configured policy;
//! streamed bodies are never replayed once the first byte reached the caller.

mod body;
mod eventstream;
mod head;
mod multipart;

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::str;
use std::time::Duration;

use curl::easy::{Easy, List, ReadError};
use url::Url;

use super::{CompletedPart, ObjectBody, ObjectStore, SelectQuery, StoreError};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::segmenter::ByteRange;
use crate::store::error::truncate_body;

pub use eventstream::SelectStats;

use body::BodyReader;
use eventstream::RecordsReader;
use head::HeadInfo;

/// Client for an S3-compatible endpoint such as MinIO or a gateway.
#[derive(Debug, Clone)]
pub struct HttpStore {
    endpoint: Url,
    headers: BTreeMap<String, String>,
    retry: RetryPolicy,
}

/// Buffered response of a non-streaming request.
struct Response {
    status: u32,
    head: HeadInfo,
    body: Vec<u8>,
}

impl HttpStore {
    pub fn new(endpoint: &str, retry: RetryPolicy) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(endpoint)?;
        if endpoint.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithoutBase);
        }
        Ok(Self {
            endpoint,
            headers: BTreeMap::new(),
            retry,
        })
    }

    /// Extra headers sent verbatim with every request (e.g. authorization).
    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// `{endpoint}/{bucket}/{key}` with each key segment percent-encoded.
    pub fn object_url(
        &self,
        bucket: &str,
        key: &str,
        query: Option<&str>,
    ) -> Result<String, StoreError> {
        let invalid = |what: &str| StoreError::InvalidKey(format!("{}/{}: {}", bucket, key, what));
        if bucket.is_empty() || bucket.contains('/') {
            return Err(invalid("bad bucket name"));
        }
        if key.is_empty() {
            return Err(invalid("empty key"));
        }
        if key.split('/').any(|s| s == "." || s == "..") {
            return Err(invalid("dot segment in key"));
        }
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| invalid("endpoint cannot hold a path"))?;
            segments.pop_if_empty().push(bucket).extend(key.split('/'));
        }
        url.set_query(query);
        Ok(url.to_string())
    }

    fn easy(&self, url: &str, extra_headers: &[String]) -> Result<Easy, StoreError> {
        let mut easy = Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.connect_timeout(Duration::from_secs(30))?;
        // Abort if throughput stays below 1 KiB/s for a minute.
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(60))?;

        let mut list = List::new();
        for (k, v) in &self.headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))?;
        }
        for h in extra_headers {
            list.append(h)?;
        }
        list.append("Expect:")?;
        easy.http_headers(list)?;
        Ok(easy)
    }

    /// Opens a streamed body; 404 becomes `NotFound`.
    fn open_body(
        &self,
        what: &str,
        bucket: &str,
        key: &str,
        build: impl Fn() -> Result<Easy, StoreError>,
    ) -> Result<BodyReader, StoreError> {
        run_with_retry(&self.retry, what, || BodyReader::open(build()?))
            .map_err(|e| not_found(e, bucket, key))
    }
}

fn not_found(e: StoreError, bucket: &str, key: &str) -> StoreError {
    match e {
        StoreError::Http { status: 404, .. } => StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        other => other,
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Runs `easy` to completion, buffering headers and body. `upload` feeds the
/// request body for PUT.
fn perform(easy: &mut Easy, upload: Option<&mut dyn Read>) -> Result<Response, StoreError> {
    let mut lines = Vec::new();
    let mut body = Vec::new();
    let mut read_error: Option<io::Error> = None;
    let read_error_slot = &mut read_error;

    let result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                lines.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        if let Some(reader) = upload {
            transfer.read_function(move |buf| match reader.read(buf) {
                Ok(n) => Ok(n),
                Err(e) => {
                    *read_error_slot = Some(e);
                    Err(ReadError::Abort)
                }
            })?;
        }
        transfer.perform()
    };

    if let Err(e) = result {
        if let Some(io_err) = read_error {
            return Err(StoreError::Io(io_err));
        }
        return Err(StoreError::Curl(e));
    }
    let head = head::parse_headers(&lines);
    let status = match head.status {
        Some(s) => s,
        None => easy.response_code()?,
    };
    Ok(Response { status, head, body })
}

/// Maps non-2xx responses to errors.
fn check_status(resp: Response, bucket: &str, key: &str) -> Result<Response, StoreError> {
    match resp.status {
        200..=299 => Ok(resp),
        404 => Err(StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }),
        status => Err(StoreError::Http {
            status,
            body: truncate_body(&resp.body),
        }),
    }
}

impl ObjectStore for HttpStore {
    fn object_size(&self, bucket: &str, key: &str) -> Result<u64, StoreError> {
        let url = self.object_url(bucket, key, None)?;
        let resp = run_with_retry(&self.retry, "HEAD", || {
            let mut easy = self.easy(&url, &[])?;
            easy.nobody(true)?;
            check_status(perform(&mut easy, None)?, bucket, key)
        })?;
        resp.head.content_length.ok_or_else(|| {
            StoreError::Protocol(format!("HEAD {} returned no Content-Length", url))
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StoreError> {
        let url = self.object_url(bucket, key, None)?;
        tracing::debug!(bucket, key, "GET object");
        let body = self.open_body("GET", bucket, key, || self.easy(&url, &[]))?;
        Ok(Box::new(body))
    }

    fn get_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> Result<ObjectBody, StoreError> {
        if range.is_empty() {
            return Ok(Box::new(io::empty()));
        }
        let url = self.object_url(bucket, key, None)?;
        let header = format!("Range: {}", range.range_header_value());
        tracing::trace!(bucket, key, %range, "GET range");
        let body = self.open_body("GET range", bucket, key, || {
            self.easy(&url, std::slice::from_ref(&header))
        })?;
        Ok(Box::new(body))
    }

    fn query_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
        query: &SelectQuery,
    ) -> Result<ObjectBody, StoreError> {
        let url = self.object_url(bucket, key, Some("select&select-type=2"))?;
        let xml = query.request_xml(range);
        tracing::trace!(bucket, key, %range, "select object content");
        let body = self.open_body("SELECT", bucket, key, || {
            let mut easy = self.easy(&url, &["Content-Type: application/xml".to_string()])?;
            easy.post(true)?;
            easy.post_fields_copy(xml.as_bytes())?;
            Ok(easy)
        })?;
        Ok(Box::new(RecordsReader::new(body)))
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        len: u64,
    ) -> Result<(), StoreError> {
        let url = self.object_url(bucket, key, None)?;
        // The reader cannot be rewound, so this request is not retried.
        let mut easy = self.easy(&url, &[])?;
        easy.upload(true)?;
        easy.in_filesize(len)?;
        check_status(perform(&mut easy, Some(body))?, bucket, key)?;
        tracing::debug!(bucket, key, len, "PUT object");
        Ok(())
    }

    fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String, StoreError> {
        let url = self.object_url(bucket, key, Some("uploads"))?;
        let resp = run_with_retry(&self.retry, "create multipart upload", || {
            let mut easy = self.easy(&url, &[])?;
            easy.post(true)?;
            easy.post_fields_copy(&[])?;
            check_status(perform(&mut easy, None)?, bucket, key)
        })?;
        let upload_id = multipart::parse_upload_id(&resp.body)?;
        tracing::debug!(bucket, key, upload_id = %upload_id, "multipart upload created");
        Ok(upload_id)
    }

    fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: &[u8],
    ) -> Result<CompletedPart, StoreError> {
        let query = format!("partNumber={}&uploadId={}", part_number, encode(upload_id));
        let url = self.object_url(bucket, key, Some(&query))?;
        let resp = run_with_retry(&self.retry, "upload part", || {
            let mut easy = self.easy(&url, &[])?;
            easy.upload(true)?;
            easy.in_filesize(data.len() as u64)?;
            let mut reader = Cursor::new(data);
            check_status(perform(&mut easy, Some(&mut reader))?, bucket, key)
        })?;
        let etag = resp.head.etag.ok_or_else(|| {
            StoreError::Protocol(format!("part {} response has no ETag", part_number))
        })?;
        Ok(CompletedPart { part_number, etag })
    }

    fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StoreError> {
        let query = format!("uploadId={}", encode(upload_id));
        let url = self.object_url(bucket, key, Some(&query))?;
        let xml = multipart::complete_xml(parts);
        let resp = run_with_retry(&self.retry, "complete multipart upload", || {
            let mut easy = self.easy(&url, &["Content-Type: application/xml".to_string()])?;
            easy.post(true)?;
            easy.post_fields_copy(xml.as_bytes())?;
            check_status(perform(&mut easy, None)?, bucket, key)
        })?;
        multipart::check_error_document(&resp.body)?;
        tracing::debug!(bucket, key, parts = parts.len(), "multipart upload completed");
        Ok(())
    }

    fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), StoreError> {
        let query = format!("uploadId={}", encode(upload_id));
        let url = self.object_url(bucket, key, Some(&query))?;
        run_with_retry(&self.retry, "abort multipart upload", || {
            let mut easy = self.easy(&url, &[])?;
            easy.custom_request("DELETE")?;
            check_status(perform(&mut easy, None)?, bucket, key)
        })?;
        tracing::debug!(bucket, key, upload_id, "multipart upload aborted");
        Ok(())
    }
}
