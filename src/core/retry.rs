use crate::core::settings::PollingSettings;
use std::time::Duration;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_FACTOR: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    max_retries: u32,
    backoff_factor: u32,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_retries: u32, backoff_factor: u32, max_delay: Duration) -> Self {
        Self {
            interval,
            max_retries,
            backoff_factor: backoff_factor.max(1),
            max_delay: max_delay.max(interval),
        }
    }

    pub fn from_settings(settings: &PollingSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.interval_secs),
            settings.max_retries,
            settings.backoff_factor,
            Duration::from_secs(settings.max_delay_secs),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Delay before the next tick for a job that has failed `retry_count` times.
    pub fn next_delay(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return self.interval;
        }

        let factor = self.backoff_factor.saturating_pow(retry_count - 1);
        self.interval
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count >= self.max_retries {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(self.next_delay(retry_count))
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_INTERVAL,
            DEFAULT_MAX_RETRIES,
            DEFAULT_BACKOFF_FACTOR,
            DEFAULT_MAX_DELAY,
        )
    }
}
