//! Cooperative cancellation for long-running operations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag. The CLI sets it on Ctrl-C; range workers check it before
/// taking the next range and let the one in flight finish.
#[derive(Debug, Clone, Default)]
pub struct AbortToken(Arc<AtomicBool>);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// True if `token` is present and set.
pub(crate) fn aborted(token: Option<&AbortToken>) -> bool {
    token.map_or(false, AbortToken::is_aborted)
}
