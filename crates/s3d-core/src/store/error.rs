//! Store error type.

use thiserror::Error;

/// Failure reported by an object store client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// libcurl reported an error (timeout, connection, etc.).
    #[error("curl: {0}")]
    Curl(#[from] curl::Error),
    /// Non-2xx response; `body` holds the (truncated) error document.
    #[error("HTTP {status}: {body}")]
    Http { status: u32, body: String },
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },
    #[error("invalid object key: {0:?}")]
    InvalidKey(String),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    /// The store answered with something we could not decode.
    #[error("protocol: {0}")]
    Protocol(String),
    /// Error event sent by the store inside a query response.
    #[error("store error {code}: {message}")]
    Server { code: String, message: String },
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),
}

impl StoreError {
    /// Wraps the error for a `Read` implementation.
    pub fn into_io(self) -> std::io::Error {
        match self {
            StoreError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}

/// Keeps error documents short enough for a log line.
pub(crate) fn truncate_body(body: &[u8]) -> String {
    const MAX: usize = 512;
    let s = String::from_utf8_lossy(body);
    let s = s.trim();
    if s.len() <= MAX {
        return s.to_string();
    }
    let mut cut = MAX;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &s[..cut])
}
