use crate::lifecycle::SessionLimits;
use crate::recovery::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one participant's call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    pub retry: RetryPolicy,
    pub session: SessionLimits,
    pub gathering_timeout_ms: u64,
    pub negotiation_timeout_ms: u64,
    pub handshake_resend_ms: u64,
    pub handshake_attempts: u32,
    pub join_timeout_ms: u64,
    pub operation_timeout_ms: u64,
    pub tick_ms: u64,
}

impl CallConfig {
    pub fn gathering_timeout(&self) -> Duration {
        Duration::from_millis(self.gathering_timeout_ms)
    }

    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }

    pub fn handshake_resend(&self) -> Duration {
        Duration::from_millis(self.handshake_resend_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            session: SessionLimits::default(),
            gathering_timeout_ms: 3_000,
            negotiation_timeout_ms: 20_000,
            handshake_resend_ms: 3_000,
            handshake_attempts: 5,
            join_timeout_ms: 10_000,
            operation_timeout_ms: 10_000,
            tick_ms: 1_000,
        }
    }
}
