use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
    pub max_duration_secs: u64,
    pub warning_before_secs: u64,
    pub extension_secs: u64,
}

impl SessionLimits {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    pub fn warning_before(&self) -> Duration {
        Duration::from_secs(self.warning_before_secs)
    }

    pub fn extension(&self) -> Duration {
        Duration::from_secs(self.extension_secs)
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_duration_secs: 1_800,
            warning_before_secs: 300,
            extension_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerSignal {
    Warning { remaining: Duration },
    Expired,
}

/// Call-duration accounting for connected time. Counting restarts from zero
/// each time the call (re)connects; extensions granted earlier are kept.
#[derive(Debug)]
pub struct SessionTimer {
    limits: SessionLimits,
    limit: Duration,
    elapsed: Duration,
    running: bool,
    warned: bool,
    expired: bool,
}

impl SessionTimer {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limit: limits.max_duration(),
            limits,
            elapsed: Duration::ZERO,
            running: false,
            warned: false,
            expired: false,
        }
    }

    pub fn start(&mut self) {
        if self.expired {
            return;
        }
        debug!("Session timer started, limit {:?}", self.limit);
        self.elapsed = Duration::ZERO;
        self.running = true;
        self.warned = false;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed)
    }

    /// Account `delta` of connected time. Warning and expiry fire once each.
    pub fn advance(&mut self, delta: Duration) -> Vec<TimerSignal> {
        let mut signals = Vec::new();
        if !self.running || self.expired {
            return signals;
        }

        self.elapsed += delta;
        if self.elapsed >= self.limit {
            info!("Session reached its limit of {:?}", self.limit);
            self.expired = true;
            self.running = false;
            self.warned = true;
            signals.push(TimerSignal::Expired);
        } else if !self.warned && self.remaining() <= self.limits.warning_before() {
            self.warned = true;
            signals.push(TimerSignal::Warning {
                remaining: self.remaining(),
            });
        }
        signals
    }

    /// Raise the cap by one extension and re-arm the warning. Returns the new
    /// limit, or `None` once the session has expired.
    pub fn extend(&mut self) -> Option<Duration> {
        if self.expired {
            return None;
        }
        self.limit += self.limits.extension();
        self.warned = false;
        info!("Session extended to {:?}", self.limit);
        Some(self.limit)
    }
}
