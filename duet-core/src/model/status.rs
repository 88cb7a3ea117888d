use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Lexicographically smallest present participant; creates the offer.
    Organizer,
    /// The second participant; answers once approved.
    Joiner,
    Undetermined,
}

/// Lifecycle of one participant's call.
///
/// `Failed` is only final once the retry budget is spent; `Rejected` and
/// `Closed` are always final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Initializing,
    WaitingForParticipant,
    RequestingApproval,
    Signaling,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Rejected,
    Closed,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Statuses a recovery attempt may move back to `Signaling`/`Connecting` from.
    pub fn is_regressed(self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::WaitingForParticipant => "waiting_for_participant",
            Self::RequestingApproval => "requesting_approval",
            Self::Signaling => "signaling",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Organizer => "organizer",
            Self::Joiner => "joiner",
            Self::Undetermined => "undetermined",
        };
        f.write_str(name)
    }
}
