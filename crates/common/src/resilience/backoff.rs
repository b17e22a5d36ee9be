//! Jittered exponential backoff
//!
//! The delay before retry `n` (attempt numbers start at 0) is the server's
//! numeric `Retry-After` when present, otherwise
//! `2^n * base_interval * uniform(1 - j, 1 + j)`.

use std::time::Duration;

use boxsdk_domain::RetrySettings;
use rand::Rng;

use crate::error::parse_retry_after;

/// Upper bound on the exponent so the multiplier stays finite.
const MAX_EXPONENT: u32 = 16;

/// Retry counter for one logical request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt_number: u32,
}

impl RetryState {
    pub fn advance(&mut self) {
        self.attempt_number += 1;
    }
}

/// Retry budget plus delay computation shared by the session and the JWT grant.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    max_attempts: u32,
    max_retries_on_exception: u32,
    base_interval: Duration,
    randomization_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

impl BackoffPolicy {
    #[must_use]
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            max_retries_on_exception: settings.max_retries_on_exception,
            base_interval: Duration::from_millis(settings.base_interval_ms),
            randomization_factor: settings.randomization_factor.clamp(0.0, 0.99),
        }
    }

    #[must_use]
    pub fn with_base_interval(mut self, base_interval: Duration) -> Self {
        self.base_interval = base_interval;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub const fn max_retries_on_exception(&self) -> u32 {
        self.max_retries_on_exception
    }

    /// Whether another status-driven retry fits in the budget.
    #[must_use]
    pub const fn can_retry(&self, state: &RetryState) -> bool {
        state.attempt_number < self.max_attempts
    }

    /// Delay before the retry following `attempt_number`.
    #[must_use]
    pub fn delay(&self, attempt_number: u32, retry_after: Option<&str>) -> Duration {
        retry_after
            .and_then(parse_retry_after)
            .unwrap_or_else(|| self.exponential_delay(attempt_number))
    }

    #[must_use]
    pub fn exponential_delay(&self, attempt_number: u32) -> Duration {
        let multiplier = f64::from(2u32.pow(attempt_number.min(MAX_EXPONENT)));
        let jitter = if self.randomization_factor > 0.0 {
            let low = 1.0 - self.randomization_factor;
            let high = 1.0 + self.randomization_factor;
            rand::thread_rng().gen_range(low..high)
        } else {
            1.0
        };
        self.base_interval.mul_f64(multiplier * jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(factor: f64) -> BackoffPolicy {
        BackoffPolicy::from_settings(&RetrySettings {
            randomization_factor: factor,
            ..RetrySettings::default()
        })
    }

    #[test]
    fn delays_grow_without_jitter() {
        let policy = policy(0.0);
        assert_eq!(policy.delay(0, None), Duration::from_secs(1));
        assert_eq!(policy.delay(1, None), Duration::from_secs(2));
        assert_eq!(policy.delay(2, None), Duration::from_secs(4));
    }

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let policy = policy(0.5);
        for attempt in 0..4 {
            let nominal = 2f64.powi(attempt as i32);
            for _ in 0..50 {
                let delay = policy.delay(attempt, None).as_secs_f64();
                assert!(delay >= nominal * 0.5 && delay <= nominal * 1.5, "{delay} for {attempt}");
            }
        }
    }

    #[test]
    fn numeric_retry_after_wins() {
        let policy = policy(0.5);
        for attempt in 0..6 {
            assert_eq!(policy.delay(attempt, Some("5")), Duration::from_secs(5));
        }
        // Non-numeric values fall back to the exponential schedule.
        let delay = policy.delay(0, Some("soon"));
        assert!(delay <= Duration::from_millis(1500));
    }

    #[test]
    fn budget_counts_retries_after_first_attempt() {
        let policy = BackoffPolicy::default();
        let mut state = RetryState::default();
        let mut retries = 0;
        while policy.can_retry(&state) {
            state.advance();
            retries += 1;
        }
        assert_eq!(retries, 5);
    }
}
