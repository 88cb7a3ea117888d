use crate::error::ProtocolError;
use crate::model::description::{Candidate, SessionDescription};
use crate::model::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Current wire schema version. Later versions only add optional fields.
pub const SCHEMA_VERSION: u8 = 1;

fn schema_version() -> u8 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Identifier of one broadcast, used for duplicate suppression.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a broadcast on the room channel carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: MessageId,
    #[serde(default = "schema_version")]
    pub version: u8,
    pub message: SignalMessage,
}

impl Envelope {
    pub fn new(message: SignalMessage) -> Self {
        Self {
            id: MessageId::new(),
            version: SCHEMA_VERSION,
            message,
        }
    }

    pub fn event_name(&self) -> &'static str {
        self.message.event_name()
    }

    /// Payload handed to the relay next to [`Envelope::event_name`].
    pub fn to_payload(&self) -> Result<serde_json::Value, ProtocolError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parse a relay broadcast, checking the event name against the payload.
    pub fn decode(event: &str, payload: serde_json::Value) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_value(payload)?;
        let expected = envelope.event_name();
        if expected != event {
            return Err(ProtocolError::EventMismatch {
                expected,
                received: event.to_owned(),
            });
        }
        Ok(envelope)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    Declined,
    RoomFull,
}

/// Shared payload of the four join-handshake events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub joiner_id: ParticipantId,
    /// Organizer identity on approvals and rejections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl JoinPayload {
    pub fn from_joiner(joiner_id: ParticipantId) -> Self {
        Self {
            joiner_id,
            from: None,
            reason: None,
        }
    }

    pub fn from_organizer(joiner_id: ParticipantId, organizer: ParticipantId) -> Self {
        Self {
            joiner_id,
            from: Some(organizer),
            reason: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferPayload {
    pub offer: SessionDescription,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub from: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<u32>,
    /// Set when the offer restarts path discovery on the existing transport.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub restart: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub answer: SessionDescription,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub from: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePayload {
    pub candidate: Candidate,
    pub from: ParticipantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SignalMessage {
    JoinRequest(JoinPayload),
    JoinApproved(JoinPayload),
    JoinRejected(JoinPayload),
    JoinerReady(JoinPayload),
    WebrtcOffer(OfferPayload),
    WebrtcAnswer(AnswerPayload),
    IceCandidate(CandidatePayload),
}

impl SignalMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::JoinRequest(_) => "join_request",
            Self::JoinApproved(_) => "join_approved",
            Self::JoinRejected(_) => "join_rejected",
            Self::JoinerReady(_) => "joiner_ready",
            Self::WebrtcOffer(_) => "webrtc_offer",
            Self::WebrtcAnswer(_) => "webrtc_answer",
            Self::IceCandidate(_) => "ice_candidate",
        }
    }

    /// Identity of whoever sent this message, if the payload names one.
    pub fn sender(&self) -> Option<&ParticipantId> {
        match self {
            Self::JoinRequest(p) | Self::JoinerReady(p) => Some(&p.joiner_id),
            Self::JoinApproved(p) | Self::JoinRejected(p) => p.from.as_ref(),
            Self::WebrtcOffer(p) => Some(&p.from),
            Self::WebrtcAnswer(p) => Some(&p.from),
            Self::IceCandidate(p) => Some(&p.from),
        }
    }
}
