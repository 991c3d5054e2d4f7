//! Delay between retry attempts.

use rand::Rng;
use std::time::Duration;

use crate::config::{BackoffKind, PolicyConfig};

/// Backoff strategy for a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// Doubling delay with up to 10% jitter, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl Backoff {
    pub fn from_config(config: &PolicyConfig) -> Self {
        match config.retry_backoff {
            BackoffKind::Fixed => Backoff::Fixed(config.retry_wait_base()),
            BackoffKind::Exponential => Backoff::Exponential {
                base: config.retry_wait_base(),
                max: config.retry_wait_max(),
            },
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                calculate_backoff(attempt, base.as_millis() as u64, max.as_millis() as u64)
            }
        }
    }
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000 && max.as_millis() < 1100);
    }

    #[test]
    fn test_fixed_backoff_from_config() {
        let mut config = PolicyConfig::named("bookingService");
        config.retry_wait_base_ms = 250;
        let backoff = Backoff::from_config(&config);
        assert_eq!(backoff.delay(1), Duration::from_millis(250));
        assert_eq!(backoff.delay(5), Duration::from_millis(250));
    }
}
