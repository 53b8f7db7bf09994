use std::time::Duration;

/// Exponential retry delays, doubling from `base` up to `max`
///
/// Delays after a 429 may exceed `max` but never `rate_limited_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base_ms: u64,
    max_ms: u64,
    rate_limited_max_ms: u64,
}

impl ExponentialBackoff {
    pub const fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            rate_limited_max_ms: max_ms,
        }
    }

    /// Sets the ceiling for delays after a 429 (never below `max`)
    pub fn with_rate_limited_max(mut self, rate_limited_max_ms: u64) -> Self {
        self.rate_limited_max_ms = rate_limited_max_ms.max(self.max_ms);
        self
    }

    /// Delay before retry number `attempt` (zero-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential_delay = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(attempt.min(20)));
        Duration::from_millis(exponential_delay.min(self.max_ms))
    }

    /// Delay after a 429: the regular delay scaled by `multiplier`, or the
    /// server's `Retry-After` when that is longer, capped at `rate_limited_max`
    pub fn rate_limited_delay(
        &self,
        attempt: u32,
        multiplier: u32,
        retry_after: Option<Duration>,
    ) -> Duration {
        let extended = self.delay(attempt).saturating_mul(multiplier.max(1));
        let wanted = match retry_after {
            Some(requested) => requested.max(extended),
            None => extended,
        };
        wanted.min(Duration::from_millis(self.rate_limited_max_ms))
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}
