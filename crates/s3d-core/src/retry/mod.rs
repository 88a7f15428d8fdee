//! Retry and backoff for store requests.
//!
//! Only request establishment is retried: once a response body has started
//! flowing to a caller, a failure is reported instead of replayed.

mod classify;
mod policy;
mod run;

pub use classify::{transient, transient_curl, transient_status};
pub use policy::{RetryPolicy, Transient};
pub use run::run_with_retry;
