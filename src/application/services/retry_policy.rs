use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue after the given delay.
    Retry(Duration),
    /// Retry budget spent; drop the message.
    Exhausted,
}

/// Bounded exponential backoff: retry `k` waits `base * 2^k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, retry_count: u32) -> Duration {
        self.base.saturating_mul(2u32.saturating_pow(retry_count))
    }

    /// `retry_count` is the count after the failure being handled was added.
    pub fn decide(&self, retry_count: u32) -> RetryDecision {
        if retry_count <= self.max_retries {
            RetryDecision::Retry(self.backoff(retry_count))
        } else {
            RetryDecision::Exhausted
        }
    }
}
