//! Multipart upload request and response documents.

use crate::store::select::{extract_tag, xml_escape};
use crate::store::{CompletedPart, StoreError};

/// `CompleteMultipartUpload` body listing `parts` in the given order.
pub(crate) fn complete_xml(parts: &[CompletedPart]) -> String {
    let mut xml = String::from("<CompleteMultipartUpload>");
    for p in parts {
        xml.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>",
            p.part_number,
            xml_escape(&p.etag)
        ));
    }
    xml.push_str("</CompleteMultipartUpload>");
    xml
}

/// Upload id from an `InitiateMultipartUploadResult` document.
pub(crate) fn parse_upload_id(body: &[u8]) -> Result<String, StoreError> {
    let text = String::from_utf8_lossy(body);
    match extract_tag(&text, "UploadId") {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(StoreError::Protocol(
            "initiate multipart upload response has no UploadId".into(),
        )),
    }
}

/// CompleteMultipartUpload may answer 200 and still carry an `<Error>`.
pub(crate) fn check_error_document(body: &[u8]) -> Result<(), StoreError> {
    let text = String::from_utf8_lossy(body);
    if !text.contains("<Error>") {
        return Ok(());
    }
    Err(StoreError::Server {
        code: extract_tag(&text, "Code").unwrap_or("Unknown").to_string(),
        message: extract_tag(&text, "Message").unwrap_or("").to_string(),
    })
}
