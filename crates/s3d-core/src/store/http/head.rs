//! Parse HTTP response header lines.

/// Headers of interest from a HEAD or PUT response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HeadInfo {
    pub status: Option<u32>,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
}

/// Status code from an `HTTP/x.y NNN reason` line.
pub(crate) fn parse_status_line(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?;
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Parse collected header lines. With redirects or interim responses the
/// lines of several responses are present; the last response wins.
pub(crate) fn parse_headers(lines: &[String]) -> HeadInfo {
    let mut info = HeadInfo::default();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(code) = parse_status_line(line.as_bytes()) {
            info = HeadInfo {
                status: Some(code),
                ..HeadInfo::default()
            };
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                info.content_length = value.parse::<u64>().ok();
            } else if name.eq_ignore_ascii_case("etag") {
                info.etag = Some(value.to_string());
            }
        }
    }
    info
}
