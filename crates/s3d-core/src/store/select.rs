//! Range query request model and XML helpers.

use serde::{Deserialize, Serialize};

use crate::segmenter::ByteRange;

/// How the first line of a CSV object is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileHeaderInfo {
    /// First line is a record.
    #[default]
    None,
    /// First line is a header whose names may be used in the expression.
    Use,
    /// First line is a header and is skipped.
    Ignore,
}

impl FileHeaderInfo {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileHeaderInfo::None => "NONE",
            FileHeaderInfo::Use => "USE",
            FileHeaderInfo::Ignore => "IGNORE",
        }
    }

    /// True if the object's first line is a header rather than a record.
    pub fn skips_first_line(&self) -> bool {
        !matches!(self, FileHeaderInfo::None)
    }
}

/// SQL expression over CSV input producing CSV output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub expression: String,
    pub file_header_info: FileHeaderInfo,
}

impl SelectQuery {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            file_header_info: FileHeaderInfo::None,
        }
    }

    pub fn with_file_header_info(mut self, info: FileHeaderInfo) -> Self {
        self.file_header_info = info;
        self
    }

    /// True for `SELECT * FROM S3Object [alias]`, the only projection a
    /// store without a query engine can answer.
    pub fn is_select_all(&self) -> bool {
        let expr = self.expression.trim().trim_end_matches(';');
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        if tokens.len() != 4 && tokens.len() != 5 {
            return false;
        }
        tokens[0].eq_ignore_ascii_case("select")
            && tokens[1] == "*"
            && tokens[2].eq_ignore_ascii_case("from")
            && tokens[3].eq_ignore_ascii_case("s3object")
    }

    /// `SelectObjectContentRequest` document scoped to `range`.
    ///
    /// `ScanRange.End` is inclusive on the wire, so the half-open range is
    /// converted here and nowhere else.
    pub fn request_xml(&self, range: ByteRange) -> String {
        let scan_range = match range.inclusive_end() {
            Some(end) => format!(
                "<ScanRange><Start>{}</Start><End>{}</End></ScanRange>",
                range.start, end
            ),
            None => String::new(),
        };
        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
                "<SelectObjectContentRequest xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">",
                "<Expression>{}</Expression>",
                "<ExpressionType>SQL</ExpressionType>",
                "<InputSerialization>",
                "<CompressionType>NONE</CompressionType>",
                "<CSV><FileHeaderInfo>{}</FileHeaderInfo></CSV>",
                "</InputSerialization>",
                "<OutputSerialization><CSV/></OutputSerialization>",
                "{}",
                "</SelectObjectContentRequest>"
            ),
            xml_escape(&self.expression),
            self.file_header_info.as_str(),
            scan_range
        )
    }
}

pub(crate) fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Text of the first `<tag>...</tag>` element in `xml`, if any.
pub(crate) fn extract_tag<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let len = xml[start..].find(&close)?;
    Some(xml[start..start + len].trim())
}
