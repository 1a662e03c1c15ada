//! Exponential reconnect backoff with jitter.
//!
//! ```text
//! retry count:   0, 1, 2, 3, 4,  5,  6,  ...
//! delay seconds: 1, 2, 4, 8, 16, 32, 60, ...   (+ 0..1000ms jitter)
//! ```

use std::time::Duration;

use rand::Rng;

use crate::config::BackoffConfig;

/// Largest retry count that still doubles the delay.
pub const DEFAULT_MAX_EXPONENT: u32 = 5;
/// Delay used once the retry count passes the exponent limit.
pub const DEFAULT_CAP: Duration = Duration::from_secs(60);
/// Upper bound (exclusive) of the random jitter.
pub const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(1000);

/// Reconnect delay schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_exponent: u32,
    pub cap: Duration,
    pub max_jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_exponent: DEFAULT_MAX_EXPONENT,
            cap: DEFAULT_CAP,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl From<&BackoffConfig> for BackoffPolicy {
    fn from(config: &BackoffConfig) -> Self {
        Self {
            max_exponent: config.max_exponent,
            cap: Duration::from_secs(config.cap_secs),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the next restart, given the current retry count.
    pub fn delay(&self, retry_count: u32) -> Duration {
        self.base(retry_count) + self.jitter()
    }

    /// Delay without jitter.
    pub fn base(&self, retry_count: u32) -> Duration {
        if retry_count > self.max_exponent {
            return self.cap;
        }
        Duration::from_secs(2u64.saturating_pow(retry_count)).min(self.cap)
    }

    fn jitter(&self) -> Duration {
        let range = self.max_jitter.as_millis() as u64;
        if range == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..range))
    }
}

/// Reconnect delay with the default schedule.
pub fn reconnect_delay(retry_count: u32) -> Duration {
    BackoffPolicy::default().delay(retry_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_range() {
        for retry in 0..=5u32 {
            let base = Duration::from_secs(1 << retry);
            for _ in 0..50 {
                let delay = reconnect_delay(retry);
                assert!(delay >= base, "retry {} gave {:?}", retry, delay);
                assert!(delay < base + Duration::from_millis(1000));
            }
        }
    }

    #[test]
    fn test_capped_after_five_retries() {
        for retry in [6, 7, 100, u32::MAX] {
            let delay = reconnect_delay(retry);
            assert!(delay >= Duration::from_secs(60));
            assert!(delay < Duration::from_secs(61));
        }
    }

    #[test]
    fn test_base_is_monotonic() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for retry in 0..20 {
            let base = policy.base(retry);
            assert!(base >= previous);
            previous = base;
        }
    }

    #[test]
    fn test_configured_schedule() {
        let policy = BackoffPolicy::from(&BackoffConfig {
            max_exponent: 8,
            cap_secs: 100,
            max_jitter_ms: 0,
        });
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(7), Duration::from_secs(100));
        assert_eq!(policy.delay(9), Duration::from_secs(100));
    }
}
