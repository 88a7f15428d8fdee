use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Record total shared by the workers of one run. Each run creates its own;
/// clones share the count.
#[derive(Debug, Clone, Default)]
pub struct RecordCounter(Arc<AtomicU64>);

impl RecordCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `n` and returns the new total.
    pub fn add(&self, n: u64) -> u64 {
        self.0.fetch_add(n, Ordering::Relaxed) + n
    }

    pub fn increment(&self) -> u64 {
        self.add(1)
    }

    /// Current total. Exact once every worker has been joined.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
