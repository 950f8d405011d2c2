use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::trace;

use crate::error::GateError;

/// Token bucket shared by every caller that talks to the model.
///
/// Requests refill at `rate` per second and up to `burst` may go out back to
/// back. The bucket starts full. Backed by a GCRA limiter, so concurrent
/// callers need no extra locking.
pub struct RequestGate {
    rate: f64,
    burst: u32,
    limiter: DefaultDirectRateLimiter,
}

impl RequestGate {
    pub fn new(rate_per_sec: f64, burst: u32) -> Result<Self, GateError> {
        if !rate_per_sec.is_finite() || rate_per_sec <= 0.0 {
            return Err(GateError::InvalidRate(rate_per_sec));
        }
        let burst_size = NonZeroU32::new(burst).ok_or(GateError::ZeroBurst)?;
        let quota = Duration::try_from_secs_f64(1.0 / rate_per_sec)
            .ok()
            .and_then(Quota::with_period)
            .ok_or(GateError::InvalidRate(rate_per_sec))?
            .allow_burst(burst_size);

        Ok(Self {
            rate: rate_per_sec,
            burst,
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Wait until one request unit is available, then take it.
    pub async fn acquire(&self) {
        if self.limiter.check().is_ok() {
            return;
        }
        trace!(rate = self.rate, "request gate waiting");
        self.limiter.until_ready().await;
    }

    /// Take a unit only if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }
}
