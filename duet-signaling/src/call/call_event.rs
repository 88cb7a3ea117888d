use crate::error::ChannelError;
use crate::transport::{PathState, TransportState};
use duet_core::{Candidate, ConnectionStatus, Envelope, ParticipantId, Role, SessionDescription};
use std::time::Duration;

/// Everything the [`Call`](crate::Call) machine reacts to. Presence, relay,
/// transport, operator and timer inputs all arrive through this one type.
#[derive(Debug, Clone)]
pub enum CallEvent {
    PresenceSync(Vec<ParticipantId>),
    PresenceJoin(ParticipantId),
    PresenceLeave(ParticipantId),
    Message(Envelope),
    ChannelFailed(ChannelError),

    ApprovalDecision {
        joiner: ParticipantId,
        approved: bool,
    },
    ExtendSession,
    Leave,

    LocalDescriptionCreated {
        generation: u32,
        description: SessionDescription,
    },
    RemoteDescriptionApplied {
        generation: u32,
    },
    NegotiationFailed {
        generation: u32,
        step: NegotiationStep,
        reason: String,
    },

    CandidateGathered(Candidate),
    GatheringComplete,
    TransportState(TransportState),
    PathState(PathState),
    RemoteMediaAvailable,
    KeepaliveLost,
    KeepaliveRestored,

    TimerFired(TimerKind),
    /// Time elapsed since the previous tick.
    Tick(Duration),
}

/// Media-transport operations whose failure resets a one-shot guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationStep {
    CreateOffer,
    CreateAnswer,
    ApplyRemote,
}

/// Timers the machine asks the runtime to arm. Firing delivers the same
/// value back as [`CallEvent::TimerFired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Handshake { round: u32 },
    GatheringDeadline { generation: u32 },
    NegotiationDeadline { generation: u32 },
    Retry { attempt: u32 },
}

/// At most one timer per slot is armed; arming replaces the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    Handshake,
    Gathering,
    Negotiation,
    Retry,
}

impl TimerKind {
    pub fn slot(&self) -> TimerSlot {
        match self {
            Self::Handshake { .. } => TimerSlot::Handshake,
            Self::GatheringDeadline { .. } => TimerSlot::Gathering,
            Self::NegotiationDeadline { .. } => TimerSlot::Negotiation,
            Self::Retry { .. } => TimerSlot::Retry,
        }
    }
}

/// Side effects returned by [`Call::apply`](crate::Call::apply), executed in
/// order by the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Broadcast(Envelope),
    CreateOffer { generation: u32, ice_restart: bool },
    CreateAnswer { generation: u32 },
    SetRemoteDescription {
        generation: u32,
        description: SessionDescription,
    },
    ApplyCandidate(Candidate),
    RestartPathDiscovery,
    /// Close the current media transport; the next operation gets a fresh one.
    ResetTransport,
    ScheduleTimer { timer: TimerKind, after: Duration },
    CancelTimer(TimerSlot),
    Notify(CallNotification),
    /// Stop capture, close the transport, leave the channel, clear timers.
    Teardown,
}

/// State changes that cross the module boundary to the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CallNotification {
    StatusChanged(ConnectionStatus),
    RoleAssigned(Role),
    /// The operator must answer with approve or reject.
    ApprovalRequested(ParticipantId),
    RemoteMediaAvailable,
    PeerUnresponsive,
    PeerResponsive,
    SessionWarning { remaining: Duration },
    SessionExtended { limit: Duration },
    SessionExpired,
    Exited(ExitReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Left,
    Rejected,
    RetriesExhausted,
    SessionExpired,
    ChannelFailed(ChannelError),
}
