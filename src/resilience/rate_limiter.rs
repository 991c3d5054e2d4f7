//! Per-policy rate limiting.
//!
//! A token bucket that is refilled to capacity at the start of every period
//! rather than leaking in continuously. Periods are measured on the monotonic
//! clock from the limiter's creation, so every caller agrees on the boundaries.

use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::resilience::error::CallError;

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub tokens: u32,
    pub capacity: u32,
    /// Time until the next refill.
    pub next_refill_in: Duration,
}

#[derive(Debug)]
struct State {
    tokens: u32,
    /// Start of the period `tokens` belongs to.
    period_start: Instant,
}

/// Fixed-period token bucket.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    capacity: u32,
    period: Duration,
    timeout: Duration,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, capacity: u32, period: Duration, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            capacity,
            period,
            timeout,
            state: Mutex::new(State {
                tokens: capacity,
                period_start: Instant::now(),
            }),
        }
    }

    /// Roll the bucket forward to the period containing `now`.
    fn refill_locked(&self, st: &mut State, now: Instant) {
        let elapsed = now.saturating_duration_since(st.period_start);
        if elapsed >= self.period {
            let periods = (elapsed.as_nanos() / self.period.as_nanos().max(1)) as u32;
            st.period_start += self.period * periods;
            st.tokens = self.capacity;
        }
    }

    /// Take a token if one is available now. Returns the wait until the next
    /// refill otherwise.
    fn poll_acquire(&self) -> Result<(), Instant> {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill_locked(&mut st, now);

        if st.tokens > 0 {
            st.tokens -= 1;
            Ok(())
        } else {
            Err(st.period_start + self.period)
        }
    }

    /// Try to acquire a permit without waiting.
    pub fn try_acquire(&self) -> bool {
        self.poll_acquire().is_ok()
    }

    /// Acquire a permit, waiting at most the configured timeout.
    pub async fn acquire(&self) -> Result<(), CallError> {
        self.acquire_within(self.timeout).await
    }

    /// Acquire a permit, waiting at most `timeout` for a refill.
    ///
    /// Fails immediately when the next refill lies beyond the wait budget.
    pub async fn acquire_within(&self, timeout: Duration) -> Result<(), CallError> {
        let deadline = Instant::now() + timeout;

        loop {
            match self.poll_acquire() {
                Ok(()) => return Ok(()),
                Err(next_refill) if next_refill <= deadline => {
                    tokio::time::sleep_until(next_refill).await;
                }
                Err(_) => {
                    tracing::warn!(policy = %self.name, "Rate limit exceeded");
                    metrics::record_rejection(&self.name, "rate_limited");
                    return Err(CallError::RateLimited {
                        policy: self.name.clone(),
                    });
                }
            }
        }
    }

    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let now = Instant::now();
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill_locked(&mut st, now);
        RateLimiterSnapshot {
            tokens: st.tokens,
            capacity: self.capacity,
            next_refill_in: (st.period_start + self.period).saturating_duration_since(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_bucket_resets_each_period() {
        let limiter = RateLimiter::new("t", 2, Duration::from_secs(1), Duration::ZERO);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());

        // Half a period is not enough: no incremental leak.
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_skips_idle_periods() {
        let limiter = RateLimiter::new("t", 1, Duration::from_secs(1), Duration::ZERO);
        assert!(limiter.try_acquire());
        tokio::time::advance(Duration::from_millis(3_500)).await;

        let snap = limiter.snapshot();
        assert_eq!(snap.tokens, 1);
        assert_eq!(snap.next_refill_in, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_fails_fast_without_budget() {
        let limiter = RateLimiter::new("t", 1, Duration::from_secs(10), Duration::ZERO);
        limiter.acquire().await.unwrap();

        let started = Instant::now();
        let err = limiter.acquire().await.unwrap_err();
        assert_eq!(err, CallError::RateLimited { policy: "t".into() });
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_next_period() {
        let limiter = RateLimiter::new("t", 1, Duration::from_millis(200), Duration::from_millis(500));
        limiter.acquire().await.unwrap();

        let started = Instant::now();
        limiter.acquire().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_rejects_when_refill_beyond_timeout() {
        let limiter = RateLimiter::new("t", 1, Duration::from_secs(5), Duration::from_secs(1));
        limiter.acquire().await.unwrap();
        assert!(limiter.acquire().await.is_err());
    }
}
