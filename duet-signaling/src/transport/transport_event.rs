use crate::call::CallEvent;
use duet_core::Candidate;

/// Aggregate connection state, as in `RTCPeerConnectionState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Network-path state, as in `RTCIceConnectionState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

/// Emitted by a media transport. `instance` identifies the transport so
/// events from a replaced one can be told apart.
#[derive(Debug, Clone)]
pub struct TransportEvent {
    pub instance: u64,
    pub kind: TransportEventKind,
}

#[derive(Debug, Clone)]
pub enum TransportEventKind {
    CandidateGathered(Candidate),
    GatheringComplete,
    ConnectionState(TransportState),
    PathState(PathState),
    RemoteMediaAvailable,
    KeepaliveLost,
    KeepaliveRestored,
}

impl TransportEvent {
    pub fn new(instance: u64, kind: TransportEventKind) -> Self {
        Self { instance, kind }
    }
}

impl From<TransportEventKind> for CallEvent {
    fn from(kind: TransportEventKind) -> Self {
        match kind {
            TransportEventKind::CandidateGathered(candidate) => CallEvent::CandidateGathered(candidate),
            TransportEventKind::GatheringComplete => CallEvent::GatheringComplete,
            TransportEventKind::ConnectionState(state) => CallEvent::TransportState(state),
            TransportEventKind::PathState(state) => CallEvent::PathState(state),
            TransportEventKind::RemoteMediaAvailable => CallEvent::RemoteMediaAvailable,
            TransportEventKind::KeepaliveLost => CallEvent::KeepaliveLost,
            TransportEventKind::KeepaliveRestored => CallEvent::KeepaliveRestored,
        }
    }
}
