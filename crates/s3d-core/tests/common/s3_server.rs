//! Minimal S3-compatible HTTP/1.1 server for integration tests.
//!
//! Path-style addressing over an in-memory bucket map. Supports HEAD, GET
//! (with `Range`), PUT, select (`POST ?select&select-type=2`, answered as an
//! event stream with unsigned frames), multipart upload and abort. One request
//! per connection.

use std::collections::{BTreeMap, HashMap};
use std::io::{BufRead, BufReader, Cursor, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use s3d_core::segmenter::ByteRange;
use s3d_core::store::local::scan_records;
use s3d_core::store::FileHeaderInfo;

/// Bytes of records per `Records` event.
const RECORDS_FRAME: usize = 100;

#[derive(Default)]
struct State {
    objects: HashMap<(String, String), Vec<u8>>,
    uploads: HashMap<String, Upload>,
    next_upload: u64,
    /// Select requests whose scan range starts here fail mid-stream.
    fail_select_at: Option<u64>,
    requests: Vec<String>,
}

struct Upload {
    bucket: String,
    key: String,
    parts: BTreeMap<u32, Vec<u8>>,
}

/// Handle to a running server. The server lives until the process exits.
#[derive(Clone)]
pub struct S3Server {
    endpoint: String,
    state: Arc<Mutex<State>>,
}

impl S3Server {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(State::default()));
        let shared = Arc::clone(&state);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let state = Arc::clone(&shared);
                thread::spawn(move || handle(stream, &state));
            }
        });
        Self {
            endpoint: format!("http://127.0.0.1:{}", port),
            state,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn put(&self, bucket: &str, key: &str, body: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert((bucket.to_string(), key.to_string()), body.to_vec());
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub fn open_uploads(&self) -> usize {
        self.state.lock().unwrap().uploads.len()
    }

    pub fn fail_select_at(&self, start: u64) {
        self.state.lock().unwrap().fail_select_at = Some(start);
    }

    /// Request lines seen so far (`METHOD target`).
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }
}

struct Request {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Request {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some()
    }
}

fn read_request(stream: &TcpStream) -> Option<Request> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);
    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut h = String::new();
        if reader.read_line(&mut h).ok()? == 0 {
            break;
        }
        let h = h.trim_end();
        if h.is_empty() {
            break;
        }
        if let Some((n, v)) = h.split_once(':') {
            headers.push((n.trim().to_string(), v.trim().to_string()));
        }
    }
    let len = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).ok()?;

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (target.clone(), String::new()),
    };
    let query = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|kv| match kv.split_once('=') {
            Some((k, v)) => (percent_decode(k, true), percent_decode(v, true)),
            None => (percent_decode(kv, true), String::new()),
        })
        .collect();
    Some(Request {
        method,
        path: percent_decode(&path, false),
        query,
        headers,
        body,
    })
}

/// Decodes `%XX` escapes; `+` means space only in query strings.
fn percent_decode(s: &str, plus_as_space: bool) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(v) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(if plus_as_space && bytes[i] == b'+' { b' ' } else { bytes[i] });
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[(&str, String)], body: &[u8]) {
    let mut head = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", status, body.len());
    for (n, v) in headers {
        head.push_str(&format!("{}: {}\r\n", n, v));
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn error_xml(code: &str, message: &str) -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Error><Code>{}</Code><Message>{}</Message></Error>",
        code, message
    )
    .into_bytes()
}

fn tag<'a>(xml: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{}>", name);
    let close = format!("</{}>", name);
    let start = xml.find(&open)? + open.len();
    let len = xml[start..].find(&close)?;
    Some(&xml[start..start + len])
}

fn etag(data: &[u8]) -> String {
    let sum = data
        .iter()
        .fold(0xcbf2_9ce4_8422_2325u64, |h, b| (h ^ *b as u64).wrapping_mul(0x100_0000_01b3));
    format!("\"{:016x}\"", sum)
}

fn handle(mut stream: TcpStream, state: &Mutex<State>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&stream) else {
        return;
    };
    let (bucket, key) = match req.path.trim_start_matches('/').split_once('/') {
        Some((b, k)) if !b.is_empty() && !k.is_empty() => (b.to_string(), k.to_string()),
        _ => {
            respond(&mut stream, "400 Bad Request", &[], &error_xml("InvalidRequest", "path-style only"));
            return;
        }
    };
    let mut st = state.lock().unwrap();
    st.requests.push(format!("{} {}", req.method, req.path));
    let id = (bucket.clone(), key.clone());

    match req.method.as_str() {
        "HEAD" => {
            let len = st.objects.get(&id).map(Vec::len);
            drop(st);
            let head = match len {
                Some(len) => format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    len
                ),
                None => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string(),
            };
            let _ = stream.write_all(head.as_bytes());
        }
        "GET" => {
            let Some(obj) = st.objects.get(&id).cloned() else {
                drop(st);
                respond(&mut stream, "404 Not Found", &[], &error_xml("NoSuchKey", "The specified key does not exist."));
                return;
            };
            drop(st);
            match req.header("range").and_then(parse_range) {
                Some((start, end_incl)) => {
                    let total = obj.len() as u64;
                    if start >= total {
                        respond(&mut stream, "416 Range Not Satisfiable", &[], b"");
                        return;
                    }
                    let end_excl = end_incl.saturating_add(1).min(total);
                    let slice = &obj[start as usize..end_excl as usize];
                    let cr = format!("bytes {}-{}/{}", start, end_excl - 1, total);
                    respond(&mut stream, "206 Partial Content", &[("Content-Range", cr)], slice);
                }
                None => respond(&mut stream, "200 OK", &[], &obj),
            }
        }
        "PUT" => {
            if let (Some(n), Some(upload_id)) = (req.param("partNumber"), req.param("uploadId")) {
                let n: u32 = n.parse().unwrap_or(0);
                let Some(upload) = st.uploads.get_mut(upload_id) else {
                    drop(st);
                    respond(&mut stream, "404 Not Found", &[], &error_xml("NoSuchUpload", upload_id));
                    return;
                };
                upload.parts.insert(n, req.body.clone());
                drop(st);
                respond(&mut stream, "200 OK", &[("ETag", etag(&req.body))], b"");
                return;
            }
            let e = etag(&req.body);
            st.objects.insert(id, req.body);
            drop(st);
            respond(&mut stream, "200 OK", &[("ETag", e)], b"");
        }
        "POST" if req.has_param("uploads") => {
            st.next_upload += 1;
            let upload_id = format!("upload-{}/{}", st.next_upload, "x+y");
            st.uploads.insert(
                upload_id.clone(),
                Upload {
                    bucket: bucket.clone(),
                    key: key.clone(),
                    parts: BTreeMap::new(),
                },
            );
            drop(st);
            let xml = format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><InitiateMultipartUploadResult><Bucket>{}</Bucket><Key>{}</Key><UploadId>{}</UploadId></InitiateMultipartUploadResult>",
                bucket, key, upload_id
            );
            respond(&mut stream, "200 OK", &[], xml.as_bytes());
        }
        "POST" if req.has_param("uploadId") => {
            let upload_id = req.param("uploadId").unwrap_or_default().to_string();
            let Some(upload) = st.uploads.remove(&upload_id) else {
                drop(st);
                respond(&mut stream, "404 Not Found", &[], &error_xml("NoSuchUpload", &upload_id));
                return;
            };
            let xml = String::from_utf8_lossy(&req.body).into_owned();
            let mut assembled = Vec::new();
            let mut rest = xml.as_str();
            while let Some(num) = tag(rest, "PartNumber") {
                let n: u32 = num.parse().unwrap_or(0);
                match upload.parts.get(&n) {
                    Some(p) => assembled.extend_from_slice(p),
                    None => {
                        drop(st);
                        // Real stores answer 200 with an error document here.
                        respond(&mut stream, "200 OK", &[], &error_xml("InvalidPart", "One or more parts could not be found."));
                        return;
                    }
                }
                let after = rest.find("</PartNumber>").unwrap_or(rest.len() - 1) + 1;
                rest = &rest[after..];
            }
            st.objects.insert((upload.bucket, upload.key), assembled);
            drop(st);
            respond(&mut stream, "200 OK", &[], b"<CompleteMultipartUploadResult/>");
        }
        "POST" if req.has_param("select") => {
            let Some(obj) = st.objects.get(&id).cloned() else {
                drop(st);
                respond(&mut stream, "404 Not Found", &[], &error_xml("NoSuchKey", "The specified key does not exist."));
                return;
            };
            let fail_at = st.fail_select_at;
            drop(st);
            select(&mut stream, &obj, &req, fail_at);
        }
        "DELETE" if req.has_param("uploadId") => {
            let removed = req
                .param("uploadId")
                .and_then(|u| st.uploads.remove(u))
                .is_some();
            drop(st);
            if removed {
                respond(&mut stream, "204 No Content", &[], b"");
            } else {
                respond(&mut stream, "404 Not Found", &[], &error_xml("NoSuchUpload", ""));
            }
        }
        _ => {
            drop(st);
            respond(&mut stream, "405 Method Not Allowed", &[], b"");
        }
    }
}

fn parse_range(value: &str) -> Option<(u64, u64)> {
    let bytes_spec = value.trim().strip_prefix("bytes=")?;
    let (a, b) = bytes_spec.split_once('-')?;
    let start = a.trim().parse().ok()?;
    let end = if b.trim().is_empty() {
        u64::MAX
    } else {
        b.trim().parse().ok()?
    };
    Some((start, end))
}

fn select(stream: &mut TcpStream, obj: &[u8], req: &Request, fail_at: Option<u64>) {
    let xml = String::from_utf8_lossy(&req.body).into_owned();
    let expression = tag(&xml, "Expression").unwrap_or("").trim().to_lowercase();
    if !expression.starts_with("select * from s3object") {
        respond(stream, "400 Bad Request", &[], &error_xml("UnsupportedSyntax", "only select-all is supported"));
        return;
    }
    let header = match tag(&xml, "FileHeaderInfo") {
        Some("USE") => FileHeaderInfo::Use,
        Some("IGNORE") => FileHeaderInfo::Ignore,
        _ => FileHeaderInfo::None,
    };
    let total = obj.len() as u64;
    let range = match (tag(&xml, "Start"), tag(&xml, "End")) {
        (Some(s), Some(e)) => {
            let start: u64 = s.parse().unwrap_or(0);
            let end_incl: u64 = e.parse().unwrap_or(0);
            ByteRange::new(start.min(total), end_incl.saturating_add(1).min(total))
        }
        _ => ByteRange::new(0, total),
    };

    let mut records = Vec::new();
    let ok = scan_records(Cursor::new(obj), range, header)
        .and_then(|mut r| r.read_to_end(&mut records))
        .is_ok();
    if !ok {
        respond(stream, "500 Internal Server Error", &[], &error_xml("InternalError", "scan failed"));
        return;
    }

    let mut out = Vec::new();
    for chunk in records.chunks(RECORDS_FRAME) {
        out.extend(event("Records", chunk));
        if fail_at == Some(range.start) {
            out.extend(frame(
                &[
                    (":message-type", "error"),
                    (":error-code", "InternalError"),
                    (":error-message", "We encountered an internal error. Please try again."),
                ],
                b"",
            ));
            respond(stream, "200 OK", &[("Content-Type", "application/octet-stream".into())], &out);
            return;
        }
        out.extend(event("Cont", b""));
    }
    let stats = format!(
        "<Stats><BytesScanned>{}</BytesScanned><BytesProcessed>{}</BytesProcessed><BytesReturned>{}</BytesReturned></Stats>",
        range.len(),
        range.len(),
        records.len()
    );
    out.extend(event("Stats", stats.as_bytes()));
    out.extend(event("End", b""));
    respond(stream, "200 OK", &[("Content-Type", "application/octet-stream".into())], &out);
}

fn event(kind: &str, payload: &[u8]) -> Vec<u8> {
    frame(&[(":message-type", "event"), (":event-type", kind)], payload)
}

/// Event-stream message with string headers; CRC fields left zero.
fn frame(headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
    let mut hdr = Vec::new();
    for (name, value) in headers {
        hdr.push(name.len() as u8);
        hdr.extend_from_slice(name.as_bytes());
        hdr.push(7);
        hdr.extend_from_slice(&(value.len() as u16).to_be_bytes());
        hdr.extend_from_slice(value.as_bytes());
    }
    let total = 12 + hdr.len() + payload.len() + 4;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(total as u32).to_be_bytes());
    out.extend_from_slice(&(hdr.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&hdr);
    out.extend_from_slice(payload);
    out.extend_from_slice(&[0; 4]);
    out
}
