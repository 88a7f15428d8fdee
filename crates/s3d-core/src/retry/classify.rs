//! Decide which store failures are transient.

use super::policy::Transient;
use crate::store::StoreError;

pub fn transient_status(code: u32) -> Option<Transient> {
    match code {
        429 | 503 => Some(Transient::Throttled),
        500..=599 => Some(Transient::ServerError(code as u16)),
        _ => None,
    }
}

pub fn transient_curl(e: &curl::Error) -> Option<Transient> {
    if e.is_operation_timedout() {
        Some(Transient::Timeout)
    } else if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        Some(Transient::Connection)
    } else {
        None
    }
}

fn transient_io(e: &std::io::Error) -> Option<Transient> {
    use std::io::ErrorKind as Io;
    match e.kind() {
        Io::TimedOut => Some(Transient::Timeout),
        Io::ConnectionReset | Io::ConnectionRefused | Io::ConnectionAborted | Io::BrokenPipe => {
            Some(Transient::Connection)
        }
        _ => None,
    }
}

/// S3 error codes returned inside a 200 or an event stream.
fn transient_code(code: &str) -> Option<Transient> {
    match code {
        "SlowDown" | "ServiceUnavailable" | "Busy" => Some(Transient::Throttled),
        "InternalError" => Some(Transient::ServerError(500)),
        "RequestTimeout" => Some(Transient::Timeout),
        _ => None,
    }
}

/// `None` means the failure is permanent and is returned to the caller.
pub fn transient(e: &StoreError) -> Option<Transient> {
    match e {
        StoreError::Curl(ce) => transient_curl(ce),
        StoreError::Http { status, .. } => transient_status(*status),
        StoreError::Io(ie) => transient_io(ie),
        StoreError::Server { code, .. } => transient_code(code),
        StoreError::NotFound { .. }
        | StoreError::InvalidKey(_)
        | StoreError::Protocol(_)
        | StoreError::UnsupportedQuery(_) => None,
    }
}
