//! Retry budget and exponential backoff.

use std::time::Duration;

use serde::Deserialize;

/// Exponential backoff with a ceiling, plus the attempt budget given to new jobs.
///
/// `next_delay_ms(n) = min(base_delay_ms * 2^min(n, max_exponent), max_delay_ms)`.
/// The exponent is clamped on its own so high attempt counts cannot overflow
/// before the final ceiling applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry is multiplied in, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Ceiling for any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Largest exponent applied to the base delay.
    #[serde(default = "default_max_exponent")]
    pub max_exponent: u32,
    /// Attempt budget [`Ingress`](crate::ingress::Ingress) stamps on new jobs.
    ///
    /// Workers never read it: exhaustion is decided by each job's own
    /// `max_attempts`, see [`Job::is_exhausted`](crate::job::Job::is_exhausted).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

const fn default_base_delay_ms() -> u64 {
    1_000
}

const fn default_max_delay_ms() -> u64 {
    60_000
}

const fn default_max_exponent() -> u32 {
    10
}

const fn default_max_attempts() -> u32 {
    3
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_exponent: default_max_exponent(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryPolicy {
    /// Delay in milliseconds before requeueing a job that has failed `attempt` times.
    #[must_use]
    pub fn next_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.min(self.max_exponent).min(63);
        self.base_delay_ms
            .saturating_mul(1_u64 << exponent)
            .min(self.max_delay_ms)
    }

    /// [`next_delay_ms`](Self::next_delay_ms) as a [`Duration`].
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.next_delay_ms(attempt))
    }

    /// Total backoff a single job can accumulate before it is dead-lettered.
    ///
    /// Retries happen after failures `1..max_attempts`; the final failure pays no delay.
    #[must_use]
    pub fn retry_horizon(&self) -> Duration {
        let total = (1..self.max_attempts)
            .map(|attempt| self.next_delay_ms(attempt))
            .fold(0_u64, u64::saturating_add);
        Duration::from_millis(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            base_delay_ms: 100,
            max_delay_ms: 10_000,
            max_exponent: 10,
            max_attempts: 3,
        }
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = policy();
        assert_eq!(policy.next_delay_ms(0), 100);
        assert_eq!(policy.next_delay_ms(1), 200);
        assert_eq!(policy.next_delay_ms(2), 400);
        assert_eq!(policy.next_delay_ms(6), 6_400);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = policy();
        assert_eq!(policy.next_delay_ms(7), 10_000);
        assert_eq!(policy.next_delay_ms(u32::MAX), 10_000);
    }

    #[test]
    fn test_exponent_clamp_prevents_overflow() {
        let policy = RetryPolicy {
            base_delay_ms: u64::MAX / 2,
            max_delay_ms: u64::MAX,
            max_exponent: 200,
            max_attempts: 3,
        };
        assert_eq!(policy.next_delay_ms(150), u64::MAX);
    }

    #[test]
    fn test_retry_horizon_sums_paid_delays() {
        // failures 1 and 2 are retried, failure 3 is dead-lettered
        assert_eq!(policy().retry_horizon(), Duration::from_millis(200 + 400));
    }

    #[test]
    fn test_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay_ms, 1_000);
        assert_eq!(policy.max_delay_ms, 60_000);
        assert_eq!(policy.max_exponent, 10);
        assert_eq!(policy.max_attempts, 3);
    }

    proptest! {
        #[test]
        fn prop_delay_never_exceeds_ceiling(
            base in 0_u64..1_000_000,
            max in 0_u64..10_000_000,
            exponent in 0_u32..64,
            attempt in any::<u32>(),
        ) {
            let policy = RetryPolicy { base_delay_ms: base, max_delay_ms: max, max_exponent: exponent, max_attempts: 3 };
            prop_assert!(policy.next_delay_ms(attempt) <= max);
        }

        #[test]
        fn prop_delay_is_monotonic(
            base in 1_u64..100_000,
            max in 1_u64..100_000_000,
            exponent in 0_u32..16,
            attempt in 0_u32..1_000,
        ) {
            let policy = RetryPolicy { base_delay_ms: base, max_delay_ms: max, max_exponent: exponent, max_attempts: 3 };
            prop_assert!(policy.next_delay_ms(attempt + 1) >= policy.next_delay_ms(attempt));
        }
    }
}
