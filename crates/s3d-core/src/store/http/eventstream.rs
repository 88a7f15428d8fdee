//! Decoder for the binary event stream carried by range-query responses.
//!
//! Message layout (all integers big-endian):
//!
//! ```text
//! total_len u32 | headers_len u32 | prelude_crc u32 | headers | payload | message_crc u32
//! ```
//!
//! Headers are `name_len u8 | name | type u8 | value`. Lengths are checked;
//! the CRC fields are skipped.

use std::io::{self, Read};

use crate::store::select::extract_tag;
use crate::store::StoreError;

const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;
/// Upper bound for a single message; real stores send records in small frames.
const MAX_MESSAGE_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Bytes(Vec<u8>),
    String(String),
    Timestamp(i64),
    Uuid([u8; 16]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Message {
    pub headers: Vec<(String, HeaderValue)>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|(n, v)| match v {
            HeaderValue::String(s) if n == name => Some(s.as_str()),
            _ => None,
        })
    }
}

fn protocol(msg: impl Into<String>) -> StoreError {
    StoreError::Protocol(msg.into())
}

/// Reads until `buf` is full or EOF; returns the number of bytes read.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], StoreError> {
        if self.buf.len() - self.pos < n {
            return Err(protocol("header block truncated"));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], StoreError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

fn parse_headers(block: &[u8]) -> Result<Vec<(String, HeaderValue)>, StoreError> {
    let mut cur = Cursor { buf: block, pos: 0 };
    let mut headers = Vec::new();
    while cur.pos < block.len() {
        let name_len = cur.take(1)?[0] as usize;
        let name = std::str::from_utf8(cur.take(name_len)?)
            .map_err(|_| protocol("header name is not UTF-8"))?
            .to_string();
        let value = match cur.take(1)?[0] {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => HeaderValue::Byte(i8::from_be_bytes(cur.array()?)),
            3 => HeaderValue::Short(i16::from_be_bytes(cur.array()?)),
            4 => HeaderValue::Int(i32::from_be_bytes(cur.array()?)),
            5 => HeaderValue::Long(i64::from_be_bytes(cur.array()?)),
            6 => {
                let len = u16::from_be_bytes(cur.array()?) as usize;
                HeaderValue::Bytes(cur.take(len)?.to_vec())
            }
            7 => {
                let len = u16::from_be_bytes(cur.array()?) as usize;
                let s = std::str::from_utf8(cur.take(len)?)
                    .map_err(|_| protocol(format!("header {} is not UTF-8", name)))?;
                HeaderValue::String(s.to_string())
            }
            8 => HeaderValue::Timestamp(i64::from_be_bytes(cur.array()?)),
            9 => HeaderValue::Uuid(cur.array()?),
            other => return Err(protocol(format!("unknown header type {}", other))),
        };
        headers.push((name, value));
    }
    Ok(headers)
}

/// Reads one message. `Ok(None)` on a clean EOF between messages.
pub(crate) fn read_message<R: Read>(r: &mut R) -> Result<Option<Message>, StoreError> {
    let mut prelude = [0u8; PRELUDE_LEN];
    match read_full(r, &mut prelude)? {
        0 => return Ok(None),
        PRELUDE_LEN => {}
        n => return Err(protocol(format!("truncated prelude ({} bytes)", n))),
    }
    let total_len = u32::from_be_bytes([prelude[0], prelude[1], prelude[2], prelude[3]]) as usize;
    let headers_len = u32::from_be_bytes([prelude[4], prelude[5], prelude[6], prelude[7]]) as usize;
    if total_len < PRELUDE_LEN + CRC_LEN || total_len > MAX_MESSAGE_LEN {
        return Err(protocol(format!("bad message length {}", total_len)));
    }
    if headers_len > total_len - PRELUDE_LEN - CRC_LEN {
        return Err(protocol(format!(
            "headers length {} exceeds message length {}",
            headers_len, total_len
        )));
    }

    let mut rest = vec![0u8; total_len - PRELUDE_LEN];
    let n = read_full(r, &mut rest)?;
    if n != rest.len() {
        return Err(protocol(format!(
            "truncated message ({} of {} bytes)",
            PRELUDE_LEN + n,
            total_len
        )));
    }
    let headers = parse_headers(&rest[..headers_len])?;
    let payload = rest[headers_len..rest.len() - CRC_LEN].to_vec();
    Ok(Some(Message { headers, payload }))
}

/// Scan statistics reported at the end of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectStats {
    pub bytes_scanned: u64,
    pub bytes_processed: u64,
    pub bytes_returned: u64,
}

impl SelectStats {
    fn parse(xml: &str) -> Self {
        let field = |tag| {
            extract_tag(xml, tag)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        };
        Self {
            bytes_scanned: field("BytesScanned"),
            bytes_processed: field("BytesProcessed"),
            bytes_returned: field("BytesReturned"),
        }
    }
}

/// Exposes the `Records` payloads of an event stream as one byte stream.
///
/// The stream must finish with an `End` event: an `error` message, or EOF
/// before `End`, is a read error so a cut-off response never looks like a
/// short but successful result.
pub(crate) struct RecordsReader<R> {
    inner: R,
    payload: Vec<u8>,
    pos: usize,
    finished: bool,
    stats: Option<SelectStats>,
}

impl<R: Read> RecordsReader<R> {
    pub(crate) fn new(inner: R) -> Self {
        Self {
            inner,
            payload: Vec::new(),
            pos: 0,
            finished: false,
            stats: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn stats(&self) -> Option<SelectStats> {
        self.stats
    }

    /// Loads the next non-empty `Records` payload. False once `End` was seen.
    fn fill(&mut self) -> Result<bool, StoreError> {
        loop {
            let Some(msg) = read_message(&mut self.inner)? else {
                return Err(StoreError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "query response ended before End event",
                )));
            };
            match msg.header_str(":message-type") {
                Some("event") => {}
                Some("error") => {
                    return Err(StoreError::Server {
                        code: msg.header_str(":error-code").unwrap_or("Unknown").to_string(),
                        message: msg.header_str(":error-message").unwrap_or("").to_string(),
                    })
                }
                other => {
                    return Err(protocol(format!("unexpected message type {:?}", other)));
                }
            }
            match msg.header_str(":event-type") {
                Some("Records") => {
                    if msg.payload.is_empty() {
                        continue;
                    }
                    self.payload = msg.payload;
                    self.pos = 0;
                    return Ok(true);
                }
                Some("Stats") => {
                    let stats = SelectStats::parse(&String::from_utf8_lossy(&msg.payload));
                    tracing::debug!(
                        bytes_scanned = stats.bytes_scanned,
                        bytes_processed = stats.bytes_processed,
                        bytes_returned = stats.bytes_returned,
                        "query stats"
                    );
                    self.stats = Some(stats);
                }
                Some("End") => {
                    self.finished = true;
                    return Ok(false);
                }
                // Progress and Cont (keep-alive) carry nothing we need.
                _ => {}
            }
        }
    }
}

impl<R: Read> Read for RecordsReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.payload.len() {
            if self.finished || !self.fill().map_err(StoreError::into_io)? {
                return Ok(0);
            }
        }
        let n = (self.payload.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.payload[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}
