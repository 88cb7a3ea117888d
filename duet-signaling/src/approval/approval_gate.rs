use duet_core::ParticipantId;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApprovalState {
    #[default]
    Unrequested,
    Pending,
    Approved,
    Rejected,
}

impl ApprovalState {
    /// Joiner side: `Unrequested -> Pending`. Returns whether a request should go out.
    pub fn request(&mut self) -> bool {
        if *self == Self::Unrequested {
            *self = Self::Pending;
            true
        } else {
            false
        }
    }

    /// Joiner side: apply the organizer's decision. Only a pending request
    /// can be decided; anything else is reported back unchanged.
    pub fn resolve(&mut self, approved: bool) -> bool {
        if *self != Self::Pending {
            return false;
        }
        *self = if approved {
            Self::Approved
        } else {
            Self::Rejected
        };
        true
    }
}

/// What the organizer should do with an incoming join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// New request: ask the operator.
    Prompt,
    /// Already waiting on the operator.
    AwaitingDecision,
    /// Decision was made earlier; repeat it.
    AlreadyApproved,
    AlreadyRejected,
    /// Another joiner holds the only seat.
    OverCapacity,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GateError {
    #[error("no pending join request from {0}")]
    NotPending(ParticipantId),
}

/// Organizer-owned approval bookkeeping. A room has one seat besides the
/// organizer.
#[derive(Debug, Default)]
pub struct ApprovalGate {
    states: HashMap<ParticipantId, ApprovalState>,
    seat: Option<ParticipantId>,
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// The organizer is approved by virtue of being elected.
    pub fn approve_self(&mut self, organizer: &ParticipantId) {
        self.states
            .insert(organizer.clone(), ApprovalState::Approved);
    }

    pub fn state(&self, participant: &ParticipantId) -> ApprovalState {
        self.states.get(participant).copied().unwrap_or_default()
    }

    pub fn seated(&self) -> Option<&ParticipantId> {
        self.seat.as_ref()
    }

    pub fn on_request(&mut self, joiner: &ParticipantId) -> RequestOutcome {
        match self.state(joiner) {
            ApprovalState::Pending => return RequestOutcome::AwaitingDecision,
            ApprovalState::Approved => return RequestOutcome::AlreadyApproved,
            ApprovalState::Rejected => return RequestOutcome::AlreadyRejected,
            ApprovalState::Unrequested => {}
        }

        if let Some(seated) = &self.seat {
            if seated != joiner {
                info!(
                    "Join request from {} while {} holds the seat",
                    joiner, seated
                );
                return RequestOutcome::OverCapacity;
            }
        }

        self.states.insert(joiner.clone(), ApprovalState::Pending);
        self.seat = Some(joiner.clone());
        debug!("Join request from {} is pending", joiner);
        RequestOutcome::Prompt
    }

    /// Record the operator's decision for a pending joiner.
    pub fn decide(
        &mut self,
        joiner: &ParticipantId,
        approved: bool,
    ) -> Result<ApprovalState, GateError> {
        let Some(state) = self.states.get_mut(joiner) else {
            return Err(GateError::NotPending(joiner.clone()));
        };
        if !state.resolve(approved) {
            return Err(GateError::NotPending(joiner.clone()));
        }
        let decided = *state;
        if decided == ApprovalState::Rejected && self.seat.as_ref() == Some(joiner) {
            self.seat = None;
        }
        Ok(decided)
    }

    /// Drop everything known about a joiner that left.
    pub fn forget(&mut self, joiner: &ParticipantId) {
        self.states.remove(joiner);
        if self.seat.as_ref() == Some(joiner) {
            self.seat = None;
        }
    }
}
