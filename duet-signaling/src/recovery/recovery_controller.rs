use crate::recovery::RetryPolicy;
use crate::transport::{PathState, TransportState};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Health as derived from the two independent transport signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthSignal {
    Connecting,
    Connected,
    Regressed(Regression),
    Closed,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regression {
    Disconnected,
    Failed,
    /// A description could not be created or applied, or the offer deadline passed.
    NegotiationError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryKind {
    /// Replace the transport and negotiate from scratch.
    Reconnect,
    /// Restart path discovery and re-offer on the same transport.
    PathRestart,
    /// Re-create the offer on the same transport.
    RetryOffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    Scheduled {
        attempt: u32,
        kind: RecoveryKind,
        after: Duration,
    },
    Immediate {
        attempt: u32,
        kind: RecoveryKind,
    },
    /// An attempt is already waiting for its backoff.
    AlreadyPending,
    Exhausted,
}

/// Bounded-retry policy driven by the organizer.
#[derive(Debug)]
pub struct RecoveryController {
    policy: RetryPolicy,
    attempts: u32,
    pending: Option<(u32, RecoveryKind)>,
    regression: Option<Regression>,
    exhausted: bool,
}

impl RecoveryController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            pending: None,
            regression: None,
            exhausted: false,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn observe_transport(&mut self, state: TransportState) -> HealthSignal {
        match state {
            TransportState::Connected => {
                self.regression = None;
                HealthSignal::Connected
            }
            TransportState::Connecting => HealthSignal::Connecting,
            TransportState::Disconnected => self.regress(Regression::Disconnected),
            TransportState::Failed => self.regress(Regression::Failed),
            TransportState::Closed => HealthSignal::Closed,
            TransportState::New => HealthSignal::Unchanged,
        }
    }

    /// Path state only ever contributes regressions; `connected` comes from
    /// the transport state.
    pub fn observe_path(&mut self, state: PathState) -> HealthSignal {
        match state {
            PathState::Disconnected => self.regress(Regression::Disconnected),
            PathState::Failed => self.regress(Regression::Failed),
            _ => HealthSignal::Unchanged,
        }
    }

    fn regress(&mut self, regression: Regression) -> HealthSignal {
        match (self.regression, regression) {
            (None, _) | (Some(Regression::Disconnected), Regression::Failed) => {
                self.regression = Some(regression);
                HealthSignal::Regressed(regression)
            }
            _ => HealthSignal::Unchanged,
        }
    }

    pub fn on_regression(&mut self, regression: Regression) -> RecoveryDecision {
        if self.exhausted {
            return RecoveryDecision::Exhausted;
        }

        if let Some((attempt, kind)) = self.pending {
            if regression == Regression::Failed && kind != RecoveryKind::PathRestart {
                info!("Escalating pending attempt {} to a path restart", attempt);
                self.pending = None;
                self.regression = None;
                return RecoveryDecision::Immediate {
                    attempt,
                    kind: RecoveryKind::PathRestart,
                };
            }
            debug!("Recovery attempt {} already pending", attempt);
            return RecoveryDecision::AlreadyPending;
        }

        if self.attempts >= self.policy.max_retries {
            warn!(
                "Retry budget of {} exhausted after {:?}",
                self.policy.max_retries, regression
            );
            self.exhausted = true;
            return RecoveryDecision::Exhausted;
        }

        self.attempts += 1;
        let attempt = self.attempts;
        match regression {
            Regression::Disconnected => {
                let after = self.policy.reconnect_delay(attempt);
                info!("Reconnect attempt {} in {:?}", attempt, after);
                self.pending = Some((attempt, RecoveryKind::Reconnect));
                RecoveryDecision::Scheduled {
                    attempt,
                    kind: RecoveryKind::Reconnect,
                    after,
                }
            }
            Regression::Failed => {
                info!("Path restart, attempt {}", attempt);
                self.regression = None;
                RecoveryDecision::Immediate {
                    attempt,
                    kind: RecoveryKind::PathRestart,
                }
            }
            Regression::NegotiationError => {
                let after = self.policy.offer_delay(attempt);
                info!("Offer retry {} in {:?}", attempt, after);
                self.pending = Some((attempt, RecoveryKind::RetryOffer));
                RecoveryDecision::Scheduled {
                    attempt,
                    kind: RecoveryKind::RetryOffer,
                    after,
                }
            }
        }
    }

    /// The backoff of `attempt` elapsed. `None` if it was superseded.
    pub fn take_due(&mut self, attempt: u32) -> Option<RecoveryKind> {
        match self.pending {
            Some((pending, kind)) if pending == attempt => {
                self.pending = None;
                self.regression = None;
                Some(kind)
            }
            _ => None,
        }
    }

    pub fn on_connected(&mut self) {
        if self.attempts > 0 {
            info!("Connected after {} recovery attempts", self.attempts);
        }
        self.attempts = 0;
        self.pending = None;
        self.regression = None;
    }

    /// Forget everything, e.g. when the peer is abandoned.
    pub fn reset(&mut self) {
        self.on_connected();
        self.exhausted = false;
    }
}
