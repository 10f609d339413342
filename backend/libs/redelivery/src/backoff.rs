/// Exponential backoff schedule for transient failures
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    /// Delay before the first retry
    pub initial_interval: Duration,
    /// Growth factor between consecutive retries
    pub multiplier: f64,
    /// Upper bound for any single delay
    pub max_interval: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(1000),
            multiplier: 2.0,
            max_interval: Duration::from_secs(10),
        }
    }
}

impl ExponentialBackoff {
    pub fn new(initial_interval: Duration, multiplier: f64, max_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier,
            max_interval,
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// `interval(1) = initial`, `interval(n + 1) = min(interval(n) * multiplier, max)`.
    pub fn interval(&self, retry: u32) -> Duration {
        let max_ms = self.max_interval.as_millis() as f64;
        let mut delay_ms = (self.initial_interval.as_millis() as f64).min(max_ms);

        for _ in 1..retry.max(1) {
            if delay_ms >= max_ms {
                break;
            }
            delay_ms = (delay_ms * self.multiplier).min(max_ms);
        }

        Duration::from_millis(delay_ms as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling_until_cap() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.interval(1), Duration::from_secs(1));
        assert_eq!(backoff.interval(2), Duration::from_secs(2));
        assert_eq!(backoff.interval(3), Duration::from_secs(4));
        assert_eq!(backoff.interval(4), Duration::from_secs(8));
        assert_eq!(backoff.interval(5), Duration::from_secs(10)); // capped
        assert_eq!(backoff.interval(50), Duration::from_secs(10));
    }

    #[test]
    fn test_retry_zero_is_treated_as_first() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.interval(0), backoff.interval(1));
    }

    #[test]
    fn test_initial_above_cap_is_clamped() {
        let backoff =
            ExponentialBackoff::new(Duration::from_secs(30), 2.0, Duration::from_secs(10));
        assert_eq!(backoff.interval(1), Duration::from_secs(10));
    }
}
