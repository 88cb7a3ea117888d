use crate::call::CallEvent;
use crate::error::ChannelError;
use duet_core::{Envelope, ParticipantId};

/// Decoded delivery from a [`SignalingChannel`](crate::SignalingChannel).
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    PresenceSync(Vec<ParticipantId>),
    PresenceJoin(ParticipantId),
    PresenceLeave(ParticipantId),
    Message(Envelope),
    Error(ChannelError),
}

impl From<ChannelEvent> for CallEvent {
    fn from(event: ChannelEvent) -> Self {
        match event {
            ChannelEvent::PresenceSync(members) => CallEvent::PresenceSync(members),
            ChannelEvent::PresenceJoin(id) => CallEvent::PresenceJoin(id),
            ChannelEvent::PresenceLeave(id) => CallEvent::PresenceLeave(id),
            ChannelEvent::Message(envelope) => CallEvent::Message(envelope),
            ChannelEvent::Error(e) => CallEvent::ChannelFailed(e),
        }
    }
}
