//! Byte-level progress of a transfer.

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot sent to the progress sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    /// Percentage in `0.0..=100.0`; an empty transfer is complete.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_transferred as f64 * 100.0 / self.total_bytes as f64).min(100.0)
    }
}

/// Counts bytes moved by all workers. Intermediate snapshots are dropped
/// when the sink is behind; the final one from [`ProgressTracker::finish`]
/// is always delivered.
pub(crate) struct ProgressTracker {
    total: u64,
    done: AtomicU64,
    tx: Option<tokio::sync::mpsc::Sender<TransferProgress>>,
}

impl ProgressTracker {
    pub fn new(total: u64, tx: Option<tokio::sync::mpsc::Sender<TransferProgress>>) -> Self {
        let t = Self {
            total,
            done: AtomicU64::new(0),
            tx,
        };
        t.send(0);
        t
    }

    pub fn add(&self, n: u64) {
        let done = self.done.fetch_add(n, Ordering::Relaxed) + n;
        self.send(done);
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    /// Waits for room in the sink and sends the final snapshot. Returns the
    /// byte count. Blocks the calling thread, so it must not run on an
    /// async worker.
    pub fn finish(&self) -> u64 {
        let done = self.done();
        if let Some(tx) = &self.tx {
            // Err only if the receiver is gone.
            let _ = tx.blocking_send(self.snapshot(done));
        }
        done
    }

    fn snapshot(&self, done: u64) -> TransferProgress {
        TransferProgress {
            bytes_transferred: done,
            total_bytes: self.total,
        }
    }

    fn send(&self, done: u64) {
        if let Some(tx) = &self.tx {
            // A full queue only means the renderer is behind.
            let _ = tx.try_send(self.snapshot(done));
        }
    }
}

/// Reader that reports every chunk it yields to a tracker.
pub(crate) struct ProgressReader<'a, R> {
    inner: R,
    tracker: &'a ProgressTracker,
}

impl<'a, R: Read> ProgressReader<'a, R> {
    pub fn new(inner: R, tracker: &'a ProgressTracker) -> Self {
        Self { inner, tracker }
    }
}

impl<R: Read> Read for ProgressReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.tracker.add(n as u64);
        }
        Ok(n)
    }
}
