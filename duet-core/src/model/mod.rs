mod description;
mod keepalive;
mod participant;
mod room;
mod signaling;
mod status;

pub use description::{Candidate, SdpKind, SessionDescription};
pub use keepalive::KeepalivePacket;
pub use participant::ParticipantId;
pub use room::RoomId;
pub use signaling::{
    AnswerPayload, CandidatePayload, Envelope, IceServerConfig, JoinPayload, MessageId,
    OfferPayload, RejectReason, SCHEMA_VERSION, SignalMessage,
};
pub use status::{ConnectionStatus, Role};
