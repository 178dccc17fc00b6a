use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limiter wait cancelled")]
pub struct RateLimitCancelled;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket allowing `rate_per_interval` events per `interval`, with
/// bursts of up to `burst`. The bucket starts full.
///
/// Waiters never hold the lock while sleeping, so one stalled caller
/// cannot keep others from taking tokens.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
    max_tokens: f64,
    refill_per_sec: f64,
}

impl RateLimiter {
    pub fn new(rate_per_interval: u32, interval: Duration, burst: u32) -> Self {
        let max_tokens = burst.max(1) as f64;
        let secs = interval.as_secs_f64().max(f64::EPSILON);

        Self {
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
            max_tokens,
            refill_per_sec: rate_per_interval.max(1) as f64 / secs,
        }
    }

    /// Take a token if one is available, otherwise report how long until
    /// the next one.
    fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.max_tokens);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - state.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_per_sec))
        }
    }

    /// Wait for a token, giving up when `cancel` fires.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), RateLimitCancelled> {
        loop {
            if cancel.is_cancelled() {
                return Err(RateLimitCancelled);
            }

            match self.try_acquire() {
                Ok(()) => return Ok(()),
                Err(delay) => {
                    tracing::debug!("Rate limited, waiting {}ms", delay.as_millis());
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(RateLimitCancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}
