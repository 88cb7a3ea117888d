use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub reconnect_backoff_ms: u64,
    pub offer_backoff_ms: u64,
}

impl RetryPolicy {
    /// Linear: `base × attempt`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms.saturating_mul(u64::from(attempt)))
    }

    /// Exponential in the retries already spent: `base × 2^(attempt - 1)`.
    pub fn offer_delay(&self, attempt: u32) -> Duration {
        let spent = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.offer_backoff_ms.saturating_mul(1u64 << spent))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            reconnect_backoff_ms: 2_000,
            offer_backoff_ms: 1_000,
        }
    }
}
