//! Retry loop: run a store request until success or the policy says stop.

use super::classify::transient;
use super::policy::RetryPolicy;
use crate::store::StoreError;

/// Runs `f` until it succeeds or the retry policy says to stop.
/// On a retryable failure, sleeps for the backoff duration then tries again.
/// `what` names the request in log lines.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, what: &str, mut f: F) -> Result<T, StoreError>
where
    F: FnMut() -> Result<T, StoreError>,
{
    let mut attempt = 1u32;
    loop {
        let err = match f() {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        let Some(why) = transient(&err) else {
            return Err(err);
        };
        let Some(delay) = policy.backoff(attempt, why) else {
            tracing::warn!(request = what, attempt, "giving up: {}", err);
            return Err(err);
        };
        tracing::warn!(
            request = what,
            attempt,
            ?why,
            delay_ms = delay.as_millis() as u64,
            "retrying after error: {}",
            err
        );
        std::thread::sleep(delay);
        attempt += 1;
    }
}
