//! Shared outbound rate limiter
//!
//! One `RateLimiter` instance is shared (behind an `Arc`) by every flow that
//! talks to the network. It guarantees that any two permitted requests are at
//! least `min_interval` apart, no matter which flow issued them.
//!
//! Processes sharing one metadata cache (a scraper and a concurrent build)
//! also share its [`PermitLedger`], which extends the guarantee across
//! process boundaries.

use crate::storage::StorageResult;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Durable record of the last permit, visible to every process
pub trait PermitLedger: Send + Sync {
    /// Reserves the next slot at least `min_interval` after the previous one
    /// handed out by any process, and returns how long to wait for it
    fn reserve(&self, min_interval: Duration) -> StorageResult<Duration>;
}

/// Enforces a minimum interval between outbound requests
///
/// Waiters queue on a fair mutex, so permits are handed out in roughly the
/// order `acquire` was called. The lock is held while sleeping, which is what
/// serializes concurrent callers.
pub struct RateLimiter {
    /// Minimum time between two permitted requests
    min_interval: Duration,

    /// When the previous permit was handed out
    last_permit: Mutex<Option<Instant>>,

    /// Pacing shared with other processes
    ledger: Option<Arc<dyn PermitLedger>>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .field("shared", &self.ledger.is_some())
            .finish()
    }
}

impl RateLimiter {
    /// Creates a limiter with the given minimum interval
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_permit: Mutex::new(None),
            ledger: None,
        }
    }

    /// Also paces against every other process using `ledger`
    pub fn with_ledger(mut self, ledger: Arc<dyn PermitLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Creates a limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Waits until the next request may be issued
    ///
    /// Never fails; the only effect is the delay.
    pub async fn acquire(&self) {
        let mut last_permit = self.last_permit.lock().await;

        if let Some(last) = *last_permit {
            let ready_at = last + self.min_interval;
            if ready_at > Instant::now() {
                tracing::trace!("Rate limiter waiting {:?}", ready_at - Instant::now());
                tokio::time::sleep_until(ready_at).await;
            }
        }

        if let Some(ledger) = &self.ledger {
            match ledger.reserve(self.min_interval) {
                Ok(wait) if !wait.is_zero() => {
                    tracing::trace!("Waiting {:?} for a permit shared with other processes", wait);
                    tokio::time::sleep(wait).await;
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Shared pacing unavailable, pacing locally: {}", e),
            }
        }

        *last_permit = Some(Instant::now());
    }
}
