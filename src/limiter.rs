//! Request start pacing and in-flight bounding.

use crate::cancel::{CancelSignal, Cancelled};
use governor::{DefaultDirectRateLimiter, Quota};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Token bucket admitting at most `qps` request starts per second, burst of one.
pub struct RateLimiter {
    limiter: DefaultDirectRateLimiter,
    qps: NonZeroU32,
}

impl RateLimiter {
    pub fn new(qps: NonZeroU32) -> Self {
        let period = Duration::from_secs(1) / qps.get();
        // A zero period only happens above 1e9 qps; treat that as one cell per nanosecond.
        let quota = Quota::with_period(period.max(Duration::from_nanos(1)))
            .unwrap_or_else(|| Quota::per_second(qps))
            .allow_burst(NonZeroU32::MIN);
        Self {
            limiter: governor::RateLimiter::direct(quota),
            qps,
        }
    }

    /// Waits for the next admission instant.
    ///
    /// A wait interrupted by cancellation does not take a cell: governor only
    /// consumes capacity when a check succeeds, never while sleeping.
    pub async fn admit(&self, cancel: &CancelSignal) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            _ = self.limiter.until_ready() => Ok(()),
        }
    }

    pub fn qps(&self) -> u32 {
        self.qps.get()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").field("qps", &self.qps).finish()
    }
}

/// Counting gate on requests in flight, independent of the start rate.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One acquired slot. The slot is released when this is dropped, on every path.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub async fn acquire(&self, cancel: &CancelSignal) -> Result<GatePermit, Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        let semaphore = Arc::clone(&self.semaphore);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Cancelled),
            permit = semaphore.acquire_owned() => {
                // The semaphore is never closed, so an error can only mean shutdown.
                permit.map(|p| GatePermit { _permit: p }).map_err(|_| Cancelled)
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently acquired and not yet released.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}
