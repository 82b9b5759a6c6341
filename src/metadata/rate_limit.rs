//! Global token bucket for the metadata API.
//!
//! One bucket per process; horizontally scaled instances each throttle
//! themselves. Decisions are immediate (`Allow`/`Deny { retry_after }`);
//! [`TokenBucket::acquire`] wraps the decision loop with the advised
//! sleep for callers that just want to wait their turn.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Outcome of a token request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// A token was consumed; proceed
    Allow,
    /// Insufficient tokens; wait at least this long
    Deny { retry_after: Duration },
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket with fractional refill
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    rate_rps: f64,
    burst: f64,
}

impl TokenBucket {
    /// Create a bucket refilling at `rate_rps` with one second of burst
    #[must_use]
    pub fn new(rate_rps: f64) -> Self {
        let rate = rate_rps.max(0.1);
        Self {
            state: Mutex::new(BucketState {
                tokens: rate,
                last_refill: Instant::now(),
            }),
            rate_rps: rate,
            burst: rate,
        }
    }

    /// Attempt to consume one token
    pub async fn try_acquire(&self) -> RateDecision {
        let mut state = self.state.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_rps).min(self.burst);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            RateDecision::Allow
        } else {
            let deficit = 1.0 - state.tokens;
            RateDecision::Deny {
                retry_after: Duration::from_secs_f64(deficit / self.rate_rps),
            }
        }
    }

    /// Consume one token, sleeping as advised until one is available
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire().await {
                RateDecision::Allow => return,
                RateDecision::Deny { retry_after } => {
                    // Floor the sleep so a tiny deficit doesn't busy-loop
                    tokio::time::sleep(retry_after.max(Duration::from_millis(1))).await;
                }
            }
        }
    }
}
