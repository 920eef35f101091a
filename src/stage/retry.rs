//! Backoff schedules and per-operation retry accounting.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay schedule between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum BackoffPolicy {
    /// Same delay before every retry.
    Fixed { delay_ms: u64 },
    /// Delay doubles with each retry, saturating at `max_ms`.
    Exponential { base_ms: u64, max_ms: u64 },
}

impl BackoffPolicy {
    /// Delay to wait after `attempt` attempts have failed (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = match *self {
            BackoffPolicy::Fixed { delay_ms } => delay_ms,
            BackoffPolicy::Exponential { base_ms, max_ms } => {
                let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
                base_ms.saturating_mul(factor).min(max_ms)
            }
        };
        Duration::from_millis(ms)
    }
}

/// Attempt accounting for one operation on one record.
///
/// Owned by the stage invocation executing the retry loop; never shared
/// across stages or records.
#[derive(Debug)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    /// Record that an attempt is being made and return its 1-based number.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// True once the attempt budget is spent.
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_is_constant() {
        let backoff = BackoffPolicy::Fixed { delay_ms: 250 };

        assert_eq!(backoff.delay(1), Duration::from_millis(250));
        assert_eq!(backoff.delay(2), Duration::from_millis(250));
        assert_eq!(backoff.delay(7), Duration::from_millis(250));
    }

    #[test]
    fn test_exponential_delay_doubles() {
        let backoff = BackoffPolicy::Exponential {
            base_ms: 100,
            max_ms: 10_000,
        };

        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_exponential_delay_saturates_at_max() {
        let backoff = BackoffPolicy::Exponential {
            base_ms: 100,
            max_ms: 300,
        };

        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(300));
        assert_eq!(backoff.delay(30), Duration::from_millis(300));
        // A huge attempt number must not overflow
        assert_eq!(backoff.delay(u32::MAX), Duration::from_millis(300));
    }

    #[test]
    fn test_retry_state_exhaustion_boundary() {
        let mut retry = RetryState::new(3);
        assert!(!retry.exhausted());

        assert_eq!(retry.record_attempt(), 1);
        assert!(!retry.exhausted());

        assert_eq!(retry.record_attempt(), 2);
        assert!(!retry.exhausted());

        assert_eq!(retry.record_attempt(), 3);
        assert!(retry.exhausted());
        assert_eq!(retry.attempts(), 3);
    }

    #[test]
    fn test_backoff_yaml_round_trip() {
        let fixed: BackoffPolicy =
            serde_yaml::from_str("policy: fixed\ndelay_ms: 10").unwrap();
        assert_eq!(fixed, BackoffPolicy::Fixed { delay_ms: 10 });

        let exponential: BackoffPolicy =
            serde_yaml::from_str("policy: exponential\nbase_ms: 20\nmax_ms: 80").unwrap();
        assert_eq!(
            exponential,
            BackoffPolicy::Exponential {
                base_ms: 20,
                max_ms: 80
            }
        );
    }
}
