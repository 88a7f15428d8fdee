//! Wall-clock timing for command output.

use std::time::{Duration, Instant};

/// Formats `d` as `"{seconds}s.{millis}"`, e.g. `12s.45` for 12.045 s.
pub fn pretty_elapsed(d: Duration) -> String {
    format!("{}s.{}", d.as_secs(), d.subsec_millis())
}

/// Measures one operation.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn pretty(&self) -> String {
        pretty_elapsed(self.elapsed())
    }
}
