use std::time::Duration;

use crate::config::RetryConfig;

/// Why a failed store request is worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transient {
    /// Connect or read timed out.
    Timeout,
    /// 429, 503 or an S3 `SlowDown`; backs off twice as long.
    Throttled,
    /// Reset, refused, DNS failure, empty reply.
    Connection,
    /// Any other 5xx.
    ServerError(u16),
}

/// Capped exponential backoff for store requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per request, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(cfg.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `failed + 1`, given that attempt `failed`
    /// (1-based) ended with `why`. `None` once attempts are used up.
    pub fn backoff(&self, failed: u32, why: Transient) -> Option<Duration> {
        if failed >= self.max_attempts {
            return None;
        }
        let shift = failed.saturating_sub(1).min(8);
        let mut delay = self.base_delay.saturating_mul(1u32 << shift);
        if why == Transient::Throttled {
            delay = delay.saturating_mul(2);
        }
        Some(delay.min(self.max_delay))
    }
}
